//! GitLab REST (v4) implementation of [`VcsHost`].
//!
//! Authenticates with a private token and follows `X-Next-Page` pagination.
//! Every request carries the configured client timeout; an expired timeout
//! surfaces as [`InspectError::Timeout`], any other failure as
//! [`InspectError::RemoteListing`].

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::GitLabConfig;
use crate::error::{InspectError, InspectResult};
use crate::models::{Commit, Group, NamespaceKind, Project, User};
use crate::remote::VcsHost;

pub struct GitLabHost {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    per_page: u32,
    timeout_secs: u64,
}

impl GitLabHost {
    pub fn new(config: &GitLabConfig) -> InspectResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| InspectError::RemoteListing(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.resolve_token(),
            per_page: config.per_page,
            timeout_secs: config.timeout_secs,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.token {
            Some(token) => req.header("PRIVATE-TOKEN", token),
            None => req,
        }
    }

    fn map_err(&self, what: &str, e: reqwest::Error) -> InspectError {
        if e.is_timeout() {
            InspectError::Timeout {
                what: what.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            InspectError::RemoteListing(format!("{}: {}", what, e))
        }
    }

    /// GET a list endpoint. Without `all` only the first page is read.
    async fn get_paged<T: DeserializeOwned>(&self, path: &str, all: bool) -> InspectResult<Vec<T>> {
        let url = self.api(path);
        let mut out = Vec::new();
        let mut page: u32 = 1;

        loop {
            let resp = self
                .request(&url)
                .query(&[("per_page", self.per_page), ("page", page)])
                .send()
                .await
                .map_err(|e| self.map_err(path, e))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(InspectError::RemoteListing(format!(
                    "GET {} failed (HTTP {}): {}",
                    path,
                    status,
                    body.chars().take(300).collect::<String>()
                )));
            }

            let next = resp
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());

            let batch: Vec<T> = resp.json().await.map_err(|e| self.map_err(path, e))?;
            out.extend(batch);

            match next {
                Some(n) if all && n > page => page = n,
                _ => break,
            }
        }

        Ok(out)
    }
}

#[derive(Debug, Deserialize)]
struct ApiNamespace {
    id: i64,
    kind: NamespaceKind,
}

#[derive(Debug, Deserialize)]
struct ApiProject {
    id: i64,
    name: String,
    #[serde(default)]
    description: Option<String>,
    web_url: String,
    http_url_to_repo: String,
    namespace: ApiNamespace,
}

impl From<ApiProject> for Project {
    fn from(p: ApiProject) -> Self {
        let namespace_id = match p.namespace.kind {
            NamespaceKind::Group => Some(p.namespace.id),
            NamespaceKind::Personal => None,
        };
        Project {
            id: p.id,
            name: p.name,
            namespace_kind: p.namespace.kind,
            namespace_id,
            description: p.description,
            web_url: p.web_url,
            clone_url: p.http_url_to_repo,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: i64,
    username: String,
    name: String,
    #[serde(default)]
    email: Option<String>,
    web_url: String,
}

impl From<ApiUser> for User {
    fn from(u: ApiUser) -> Self {
        User {
            id: u.id,
            username: u.username,
            name: u.name,
            email: u.email,
            web_url: u.web_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiGroup {
    id: i64,
    name: String,
    #[serde(default)]
    description: Option<String>,
    web_url: String,
}

impl From<ApiGroup> for Group {
    fn from(g: ApiGroup) -> Self {
        Group {
            id: g.id,
            name: g.name,
            description: g.description,
            web_url: g.web_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    id: String,
    authored_date: DateTime<FixedOffset>,
}

impl ApiCommit {
    fn into_commit(self, project_id: i64) -> Commit {
        Commit {
            id: self.id,
            authored_at: self.authored_date.with_timezone(&Utc),
            project_id,
        }
    }
}

#[async_trait]
impl VcsHost for GitLabHost {
    async fn list_projects(&self) -> InspectResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .get_paged::<ApiProject>("/projects", true)
            .await?
            .into_iter()
            .map(Project::from)
            .collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn list_users(&self) -> InspectResult<Vec<User>> {
        let mut users: Vec<User> = self
            .get_paged::<ApiUser>("/users", true)
            .await?
            .into_iter()
            .map(User::from)
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn list_groups(&self) -> InspectResult<Vec<Group>> {
        let mut groups: Vec<Group> = self
            .get_paged::<ApiGroup>("/groups", true)
            .await?
            .into_iter()
            .map(Group::from)
            .collect();
        groups.sort_by_key(|g| g.id);
        Ok(groups)
    }

    async fn list_project_members(&self, project_id: i64) -> InspectResult<Vec<i64>> {
        let members = self
            .get_paged::<ApiMember>(&format!("/projects/{}/members", project_id), true)
            .await?;
        Ok(members.into_iter().map(|m| m.id).collect())
    }

    async fn list_group_members(&self, group_id: i64) -> InspectResult<Vec<i64>> {
        let members = self
            .get_paged::<ApiMember>(&format!("/groups/{}/members/all", group_id), true)
            .await?;
        Ok(members.into_iter().map(|m| m.id).collect())
    }

    async fn list_commits(&self, project_id: i64, all: bool) -> InspectResult<Vec<Commit>> {
        let commits = self
            .get_paged::<ApiCommit>(
                &format!("/projects/{}/repository/commits", project_id),
                all,
            )
            .await?;
        Ok(commits
            .into_iter()
            .map(|c| c.into_commit(project_id))
            .collect())
    }

    async fn download_archive(&self, project_id: i64, sha: &str) -> InspectResult<Vec<u8>> {
        let what = format!("archive {} of project {}", sha, project_id);
        let url = self.api(&format!("/projects/{}/repository/archive.zip", project_id));
        let resp = self
            .request(&url)
            .query(&[("sha", sha)])
            .send()
            .await
            .map_err(|e| self.map_err(&what, e))?;

        if !resp.status().is_success() {
            return Err(InspectError::RemoteListing(format!(
                "{} failed (HTTP {})",
                what,
                resp.status()
            )));
        }

        let bytes = resp.bytes().await.map_err(|e| self.map_err(&what, e))?;
        Ok(bytes.to_vec())
    }
}
