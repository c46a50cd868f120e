//! # repo-inspect
//!
//! Audits the repositories of a GitLab host. For each project the newest
//! commit is staged, an external static-analysis tool runs over it, and its
//! free-text report is parsed into defect records stored per inspection
//! batch. A second path scans the staged sources directly and harvests HTTP
//! route strings and database connection URLs (credentials redacted).
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌─────────┐
//! │  GitLab   │──▶│ Staging  │──▶│ Analyzer │──▶│  Report  │──▶│ SQLite  │
//! │ (VcsHost) │   │ (zip)    │   │ (pylint) │   │  parser  │   │ batches │
//! └───────────┘   └────┬─────┘   └──────────┘   └──────────┘   └─────────┘
//!                      │
//!                      ▼
//!               ┌─────────────┐   ┌──────────────────┐   ┌─────────────┐
//!               │ Classifier  │──▶│ Routes / URLs    │──▶│ SQLite      │
//!               └─────────────┘   └──────────────────┘   │ harvest     │
//!                                                        └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! repo-inspect init                    # create database
//! repo-inspect sync                    # store projects, users, groups
//! repo-inspect inspect-all             # inspect every project
//! repo-inspect harvest all             # collect routes and connection URLs
//! repo-inspect export routes --output routes.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Per-project error taxonomy |
//! | [`models`] | Core data types |
//! | [`remote`] | VCS host collaborator trait |
//! | [`connector_gitlab`] | GitLab REST implementation of the host |
//! | [`directory`] | Project/user/group lookup tables |
//! | [`staging`] | Snapshot staging with scoped cleanup |
//! | [`analyzer`] | External analysis tool |
//! | [`report`] | Analyzer report line parser |
//! | [`classify`] | Project architecture classification |
//! | [`routes`] | Route extraction strategies |
//! | [`credentials`] | Connection URL extraction and redaction |
//! | [`inspect`] | Inspection orchestration and throttle |
//! | [`harvest`] | Fleet-wide route / URL harvesting |
//! | [`sync`] | Directory sync into reference tables |
//! | [`store`] | Dedup-aware persistence |
//! | [`export`] | JSON export |
//! | [`progress`] | Fleet progress on stderr |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod analyzer;
pub mod classify;
pub mod config;
pub mod connector_gitlab;
pub mod credentials;
pub mod db;
pub mod directory;
pub mod error;
pub mod export;
pub mod harvest;
pub mod inspect;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod remote;
pub mod report;
pub mod routes;
pub mod staging;
pub mod store;
pub mod sync;
