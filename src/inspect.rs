//! Inspection orchestration.
//!
//! One project moves through
//!
//! ```text
//! START → commit lookup → THROTTLE_CHECK ──────────────▶ (SKIPPED_RECENT)
//!                               │
//!                               ▼
//!         SNAPSHOT → ANALYZER → PARSE ──────────────────▶ (NO_DEFECTS)
//!                                 │
//!                                 ▼
//!                   BATCH_CREATE → DETAIL_INSERT ───────▶ (DONE)
//! ```
//!
//! A project without commits fails with [`InspectError::NoCommit`] before any
//! staging work. The store must hold exactly one row for the project before
//! the throttle can be evaluated or a batch created.
//!
//! [`Inspector::inspect_all`] runs every project of the directory in id order.
//! Per-project errors are logged and counted; fatal errors
//! ([`InspectError::is_fatal`]) stop the run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzer::Analyzer;
use crate::directory::Directory;
use crate::error::{InspectError, InspectResult};
use crate::models::{Commit, DefectRecord, Project};
use crate::progress::{FleetProgressEvent, FleetProgressReporter};
use crate::remote::VcsHost;
use crate::report::ReportParser;
use crate::staging::{stage_commit, StagingArea};
use crate::store::Store;

/// Minimum spacing between two inspections of the same project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    hours: i64,
}

impl Throttle {
    pub fn new(hours: i64) -> Self {
        Self { hours }
    }

    /// True when fewer than `hours` whole hours have passed since `last`.
    /// Elapsed time is measured in total hours, so a gap of two days and
    /// three hours counts as 51 hours.
    pub fn should_skip(&self, last: i64, now: i64) -> bool {
        let elapsed_hours = (now - last).div_euclid(3600);
        elapsed_hours < self.hours
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(20)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectOutcome {
    /// Inspected within the throttle window; nothing was done.
    SkippedRecent { last_batch_at: i64 },
    /// The analyzer reported nothing; no batch was created.
    NoDefects { commit: String },
    Done {
        commit: String,
        batch_id: i64,
        defects: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectFailure {
    pub project_id: i64,
    pub project: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetSummary {
    pub total: usize,
    pub inspected: usize,
    pub no_defects: usize,
    pub skipped_recent: usize,
    pub defects: usize,
    pub failures: Vec<ProjectFailure>,
}

pub struct Inspector<'a> {
    host: &'a dyn VcsHost,
    analyzer: &'a dyn Analyzer,
    store: &'a Store,
    area: &'a StagingArea,
    parser: ReportParser,
    throttle: Throttle,
}

impl<'a> Inspector<'a> {
    pub fn new(
        host: &'a dyn VcsHost,
        analyzer: &'a dyn Analyzer,
        store: &'a Store,
        area: &'a StagingArea,
    ) -> Self {
        Self {
            host,
            analyzer,
            store,
            area,
            parser: ReportParser::default(),
            throttle: Throttle::default(),
        }
    }

    pub fn with_parser(mut self, parser: ReportParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Inspect the newest commit of `project`, honoring the throttle.
    pub async fn inspect_latest_at(
        &self,
        project: &Project,
        now: DateTime<Utc>,
    ) -> InspectResult<InspectOutcome> {
        let commit = self
            .host
            .list_commits(project.id, false)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| InspectError::NoCommit(project.name.clone()))?;

        let row = self.store.project_row_id(project.id).await?;
        if let Some(last) = self.store.latest_batch_at(row).await? {
            if self.throttle.should_skip(last, now.timestamp()) {
                tracing::info!(
                    project_id = project.id,
                    project = %project.name,
                    last_batch_at = last,
                    "inspected recently, skipping"
                );
                return Ok(InspectOutcome::SkippedRecent {
                    last_batch_at: last,
                });
            }
        }

        self.run(project, row, &commit, now).await
    }

    /// Inspect a specific commit. The throttle does not apply.
    pub async fn inspect_commit_at(
        &self,
        project: &Project,
        sha: &str,
        now: DateTime<Utc>,
    ) -> InspectResult<InspectOutcome> {
        let commits = self.host.list_commits(project.id, true).await?;
        if commits.is_empty() {
            return Err(InspectError::NoCommit(project.name.clone()));
        }
        let commit = commits
            .into_iter()
            .find(|c| c.id == sha || (sha.len() >= 7 && c.id.starts_with(sha)))
            .ok_or_else(|| InspectError::CommitNotFound {
                project: project.name.clone(),
                commit: sha.to_string(),
            })?;

        let row = self.store.project_row_id(project.id).await?;
        self.run(project, row, &commit, now).await
    }

    async fn run(
        &self,
        project: &Project,
        row: i64,
        commit: &Commit,
        now: DateTime<Utc>,
    ) -> InspectResult<InspectOutcome> {
        let snapshot = stage_commit(self.host, self.area, project, &commit.id).await?;
        let report = self.analyzer.run(&snapshot).await?;

        let defects: Vec<DefectRecord> = self
            .parser
            .parse_report(&report)
            .into_iter()
            .map(|parsed| DefectRecord::from_parsed(parsed, &commit.id))
            .collect();

        let outcome = match self
            .store
            .record_inspection(row, now.timestamp(), &defects)
            .await?
        {
            None => InspectOutcome::NoDefects {
                commit: commit.id.clone(),
            },
            Some(batch_id) => InspectOutcome::Done {
                commit: commit.id.clone(),
                batch_id,
                defects: defects.len(),
            },
        };
        tracing::info!(
            project_id = project.id,
            project = %project.name,
            commit = %commit.id,
            defects = defects.len(),
            "inspection finished"
        );
        Ok(outcome)
    }

    /// Inspect every project in `directory`, isolating per-project failures.
    pub async fn inspect_all(
        &self,
        directory: &Directory,
        now: DateTime<Utc>,
        progress: &dyn FleetProgressReporter,
    ) -> InspectResult<FleetSummary> {
        let mut summary = FleetSummary {
            total: directory.project_count(),
            ..FleetSummary::default()
        };

        for (i, project) in directory.projects().enumerate() {
            progress.report(FleetProgressEvent::Project {
                task: "inspect".to_string(),
                n: i as u64 + 1,
                total: summary.total as u64,
                name: project.name.clone(),
            });

            match self.inspect_latest_at(project, now).await {
                Ok(InspectOutcome::SkippedRecent { .. }) => summary.skipped_recent += 1,
                Ok(InspectOutcome::NoDefects { .. }) => summary.no_defects += 1,
                Ok(InspectOutcome::Done { defects, .. }) => {
                    summary.inspected += 1;
                    summary.defects += defects;
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(
                        project_id = project.id,
                        project = %project.name,
                        error = %e,
                        "fatal error, stopping fleet inspection"
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        project_id = project.id,
                        project = %project.name,
                        error = %e,
                        "inspection failed"
                    );
                    summary.failures.push(ProjectFailure {
                        project_id: project.id,
                        project: project.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        progress.report(FleetProgressEvent::Finished {
            task: "inspect".to_string(),
            ok: (summary.total - summary.failures.len()) as u64,
            failed: summary.failures.len() as u64,
        });
        Ok(summary)
    }
}
