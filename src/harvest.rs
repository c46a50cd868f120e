//! Fleet-wide route and connection-URL harvesting.
//!
//! Runs beside the inspection pipeline: the newest commit of every project is
//! staged, classified and scanned directly, without the analyzer and without
//! touching batches. When the loop is over the selected output tables are
//! replaced in one go.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{classify, ProjectKind, TreeListing};
use crate::config::ExtractConfig;
use crate::credentials;
use crate::directory::Directory;
use crate::error::{InspectError, InspectResult};
use crate::inspect::ProjectFailure;
use crate::models::{CredentialUrlRecord, Project, RouteRecord};
use crate::progress::{FleetProgressEvent, FleetProgressReporter};
use crate::remote::VcsHost;
use crate::routes::extract_routes;
use crate::staging::{stage_commit, StagingArea};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestTarget {
    Routes,
    Urls,
    All,
}

impl HarvestTarget {
    pub fn routes(&self) -> bool {
        matches!(self, HarvestTarget::Routes | HarvestTarget::All)
    }

    pub fn urls(&self) -> bool {
        matches!(self, HarvestTarget::Urls | HarvestTarget::All)
    }
}

/// What one project yielded.
#[derive(Debug, Clone)]
pub struct ProjectHarvest {
    pub kind: ProjectKind,
    pub routes: Vec<RouteRecord>,
    pub urls: Vec<CredentialUrlRecord>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestSummary {
    pub total: usize,
    pub routes: usize,
    pub urls: usize,
    pub failures: Vec<ProjectFailure>,
}

pub struct Harvester<'a> {
    host: &'a dyn VcsHost,
    area: &'a StagingArea,
    extract: &'a ExtractConfig,
}

impl<'a> Harvester<'a> {
    pub fn new(host: &'a dyn VcsHost, area: &'a StagingArea, extract: &'a ExtractConfig) -> Self {
        Self {
            host,
            area,
            extract,
        }
    }

    pub async fn harvest_project(
        &self,
        project: &Project,
        target: HarvestTarget,
    ) -> InspectResult<ProjectHarvest> {
        let commit = self
            .host
            .list_commits(project.id, false)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| InspectError::NoCommit(project.name.clone()))?;

        let snapshot = stage_commit(self.host, self.area, project, &commit.id).await?;
        let listing = TreeListing::scan(snapshot.dir())
            .map_err(|e| InspectError::path(snapshot.dir(), e.to_string()))?;
        let kind = classify(&listing);

        let routes = if target.routes() {
            extract_routes(kind, snapshot.dir(), project.id, self.extract)?
        } else {
            Vec::new()
        };
        let urls = if target.urls() {
            credentials::scan_tree(snapshot.dir(), project.id)?
        } else {
            Vec::new()
        };

        tracing::debug!(
            project_id = project.id,
            project = %project.name,
            kind = kind.as_str(),
            routes = routes.len(),
            urls = urls.len(),
            "project harvested"
        );
        Ok(ProjectHarvest { kind, routes, urls })
    }

    /// Harvest every project and replace the selected output tables.
    pub async fn harvest_all(
        &self,
        directory: &Directory,
        target: HarvestTarget,
        store: &Store,
        now: DateTime<Utc>,
        progress: &dyn FleetProgressReporter,
    ) -> InspectResult<HarvestSummary> {
        let mut summary = HarvestSummary {
            total: directory.project_count(),
            ..HarvestSummary::default()
        };
        let mut routes = Vec::new();
        let mut urls = Vec::new();

        for (i, project) in directory.projects().enumerate() {
            progress.report(FleetProgressEvent::Project {
                task: "harvest".to_string(),
                n: i as u64 + 1,
                total: summary.total as u64,
                name: project.name.clone(),
            });

            match self.harvest_project(project, target).await {
                Ok(found) => {
                    routes.extend(found.routes);
                    urls.extend(found.urls);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        project_id = project.id,
                        project = %project.name,
                        error = %e,
                        "harvest failed"
                    );
                    summary.failures.push(ProjectFailure {
                        project_id: project.id,
                        project: project.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if target.routes() {
            summary.routes = store.replace_routes(&routes, now.timestamp()).await?;
        }
        if target.urls() {
            summary.urls = store.replace_credential_urls(&urls, now.timestamp()).await?;
        }

        progress.report(FleetProgressEvent::Finished {
            task: "harvest".to_string(),
            ok: (summary.total - summary.failures.len()) as u64,
            failed: summary.failures.len() as u64,
        });
        tracing::info!(
            routes = summary.routes,
            urls = summary.urls,
            failed = summary.failures.len(),
            "harvest finished"
        );
        Ok(summary)
    }
}
