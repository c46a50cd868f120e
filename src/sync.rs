//! Directory sync into the reference tables.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::directory::Directory;
use crate::error::InspectResult;
use crate::models::{Group, GroupUser, NamespaceKind, Project, ProjectGroup, ProjectUser, User};
use crate::progress::{FleetProgressEvent, FleetProgressReporter};
use crate::remote::VcsHost;
use crate::store::Store;

/// Rows written per table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub projects: usize,
    pub users: usize,
    pub groups: usize,
    pub project_groups: usize,
    pub project_users: usize,
    pub group_users: usize,
    /// Membership listings that failed and were skipped.
    pub failed_listings: usize,
}

pub async fn sync_directory(
    host: &dyn VcsHost,
    store: &Store,
    directory: &Directory,
    now: DateTime<Utc>,
    progress: &dyn FleetProgressReporter,
) -> InspectResult<SyncSummary> {
    let now = now.timestamp();
    let mut summary = SyncSummary::default();

    let projects: Vec<Project> = directory.projects().cloned().collect();
    let users: Vec<User> = directory.users().cloned().collect();
    let groups: Vec<Group> = directory.groups().cloned().collect();
    summary.projects = store.insert_dedup(&projects, now).await?;
    summary.users = store.insert_dedup(&users, now).await?;
    summary.groups = store.insert_dedup(&groups, now).await?;

    let project_groups: Vec<ProjectGroup> = projects
        .iter()
        .filter(|p| p.namespace_kind == NamespaceKind::Group)
        .filter_map(|p| {
            p.namespace_id.map(|group_id| ProjectGroup {
                project_id: p.id,
                group_id,
            })
        })
        .collect();
    summary.project_groups = store.insert_dedup(&project_groups, now).await?;

    let total = projects.len() as u64;
    let mut project_users = Vec::new();
    for (i, project) in projects.iter().enumerate() {
        progress.report(FleetProgressEvent::Project {
            task: "sync members".to_string(),
            n: i as u64 + 1,
            total,
            name: project.name.clone(),
        });
        match host.list_project_members(project.id).await {
            Ok(ids) => project_users.extend(ids.into_iter().map(|user_id| ProjectUser {
                project_id: project.id,
                user_id,
            })),
            Err(e) => {
                tracing::warn!(
                    project_id = project.id,
                    project = %project.name,
                    error = %e,
                    "listing project members failed"
                );
                summary.failed_listings += 1;
            }
        }
    }
    summary.project_users = store.insert_dedup(&project_users, now).await?;

    let mut group_users = Vec::new();
    for group in &groups {
        match host.list_group_members(group.id).await {
            Ok(ids) => group_users.extend(ids.into_iter().map(|user_id| GroupUser {
                group_id: group.id,
                user_id,
            })),
            Err(e) => {
                tracing::warn!(
                    group_id = group.id,
                    group = %group.name,
                    error = %e,
                    "listing group members failed"
                );
                summary.failed_listings += 1;
            }
        }
    }
    summary.group_users = store.insert_dedup(&group_users, now).await?;

    progress.report(FleetProgressEvent::Finished {
        task: "sync".to_string(),
        ok: total,
        failed: summary.failed_listings as u64,
    });
    tracing::info!(
        projects = summary.projects,
        users = summary.users,
        groups = summary.groups,
        project_users = summary.project_users,
        group_users = summary.group_users,
        "directory synced"
    );
    Ok(summary)
}
