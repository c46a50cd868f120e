//! Read-only lookup tables for the VCS host directory.
//!
//! Built once at startup. Project ids are authoritative; names are not unique
//! on the host, so the name index maps to every matching id and a name lookup
//! with more than one match is reported instead of silently picking one.

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::error::{InspectError, InspectResult};
use crate::models::{Group, Project, User};
use crate::remote::VcsHost;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no project named {0}")]
    NotFound(String),
    #[error("{count} projects are named {name}: ids {ids:?}")]
    Ambiguous {
        name: String,
        count: usize,
        ids: Vec<i64>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    projects: BTreeMap<i64, Project>,
    names: HashMap<String, Vec<i64>>,
    users: BTreeMap<i64, User>,
    groups: BTreeMap<i64, Group>,
}

impl Directory {
    pub fn new(projects: Vec<Project>, users: Vec<User>, groups: Vec<Group>) -> Self {
        let projects: BTreeMap<i64, Project> = projects.into_iter().map(|p| (p.id, p)).collect();
        let mut names: HashMap<String, Vec<i64>> = HashMap::new();
        for p in projects.values() {
            names.entry(p.name.clone()).or_default().push(p.id);
        }
        Self {
            projects,
            names,
            users: users.into_iter().map(|u| (u.id, u)).collect(),
            groups: groups.into_iter().map(|g| (g.id, g)).collect(),
        }
    }

    /// List projects, users and groups from the host.
    pub async fn load(host: &dyn VcsHost) -> InspectResult<Self> {
        let projects = host.list_projects().await?;
        let users = host.list_users().await?;
        let groups = host.list_groups().await?;
        tracing::info!(
            projects = projects.len(),
            users = users.len(),
            groups = groups.len(),
            "directory loaded"
        );
        Ok(Self::new(projects, users, groups))
    }

    pub fn project(&self, id: i64) -> InspectResult<&Project> {
        self.projects.get(&id).ok_or(InspectError::UnknownProject(id))
    }

    /// Every project carrying `name`, in id order.
    pub fn projects_named(&self, name: &str) -> Vec<&Project> {
        self.names
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.projects.get(id)).collect())
            .unwrap_or_default()
    }

    /// The single project carrying `name`.
    pub fn project_by_name(&self, name: &str) -> Result<&Project, LookupError> {
        match self.projects_named(name).as_slice() {
            [] => Err(LookupError::NotFound(name.to_string())),
            [one] => Ok(*one),
            many => Err(LookupError::Ambiguous {
                name: name.to_string(),
                count: many.len(),
                ids: many.iter().map(|p| p.id).collect(),
            }),
        }
    }

    /// Projects in ascending id order.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}
