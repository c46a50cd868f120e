//! The VCS host collaborator.
//!
//! The pipelines only ever talk to a [`VcsHost`]: directory listings, commit
//! listings and commit archives. [`crate::connector_gitlab::GitLabHost`] is
//! the production implementation; tests supply in-memory hosts.
//!
//! Every method may fail with
//! [`InspectError::RemoteListing`](crate::error::InspectError::RemoteListing)
//! or [`InspectError::Timeout`](crate::error::InspectError::Timeout); callers
//! treat both as per-project failures.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use repo_inspect::error::InspectResult;
//! use repo_inspect::models::{Commit, Group, Project, User};
//! use repo_inspect::remote::VcsHost;
//!
//! struct EmptyHost;
//!
//! #[async_trait]
//! impl VcsHost for EmptyHost {
//!     async fn list_projects(&self) -> InspectResult<Vec<Project>> { Ok(vec![]) }
//!     async fn list_users(&self) -> InspectResult<Vec<User>> { Ok(vec![]) }
//!     async fn list_groups(&self) -> InspectResult<Vec<Group>> { Ok(vec![]) }
//!     async fn list_project_members(&self, _: i64) -> InspectResult<Vec<i64>> { Ok(vec![]) }
//!     async fn list_group_members(&self, _: i64) -> InspectResult<Vec<i64>> { Ok(vec![]) }
//!     async fn list_commits(&self, _: i64, _: bool) -> InspectResult<Vec<Commit>> { Ok(vec![]) }
//!     async fn download_archive(&self, _: i64, _: &str) -> InspectResult<Vec<u8>> { Ok(vec![]) }
//! }
//! ```

use async_trait::async_trait;

use crate::error::InspectResult;
use crate::models::{Commit, Group, Project, User};

#[async_trait]
pub trait VcsHost: Send + Sync {
    async fn list_projects(&self) -> InspectResult<Vec<Project>>;

    async fn list_users(&self) -> InspectResult<Vec<User>>;

    async fn list_groups(&self) -> InspectResult<Vec<Group>>;

    /// User ids with access to the project.
    async fn list_project_members(&self, project_id: i64) -> InspectResult<Vec<i64>>;

    /// User ids in the group, inherited memberships included.
    async fn list_group_members(&self, group_id: i64) -> InspectResult<Vec<i64>>;

    /// Commits of the default branch, newest first. Without `all` only the
    /// first page is fetched.
    async fn list_commits(&self, project_id: i64, all: bool) -> InspectResult<Vec<Commit>>;

    /// The commit's full tree as a zip archive. Entries sit under a single
    /// top-level directory named after the project and commit.
    async fn download_archive(&self, project_id: i64, sha: &str) -> InspectResult<Vec<u8>>;
}
