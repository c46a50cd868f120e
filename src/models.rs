//! Core data models used throughout the inspector.
//!
//! Directory entities (projects, users, groups) come from the VCS host and are
//! immutable for a run. Inspection and extraction records are what the
//! pipelines produce and persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner kind of a project namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    #[serde(alias = "user")]
    Personal,
    Group,
}

impl NamespaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceKind::Personal => "personal",
            NamespaceKind::Group => "group",
        }
    }
}

/// A project as listed by the VCS host.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Remote-assigned, stable id.
    pub id: i64,
    /// Not unique across the host.
    pub name: String,
    pub namespace_kind: NamespaceKind,
    /// Group id when `namespace_kind` is `Group`.
    pub namespace_id: Option<i64>,
    pub description: Option<String>,
    pub web_url: String,
    pub clone_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub web_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub web_url: String,
}

/// Membership relations, keyed by remote ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectUser {
    pub project_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectGroup {
    pub project_id: i64,
    pub group_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupUser {
    pub group_id: i64,
    pub user_id: i64,
}

/// A commit of a project. Newest first when listed.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub id: String,
    pub authored_at: DateTime<Utc>,
    pub project_id: i64,
}

/// One defect line decoded from the analyzer report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDefect {
    pub filename: String,
    pub location: String,
    pub error_msg: String,
    pub error_code: String,
    pub error_type: String,
    /// The raw report line without its line terminator.
    pub content: String,
}

/// A defect ready to be linked to a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectRecord {
    pub file_name: String,
    pub file_path: String,
    pub commit_id: String,
    pub error_msg: String,
    pub error_code: String,
    pub error_type: String,
    pub location: String,
    pub content: String,
}

impl DefectRecord {
    pub fn from_parsed(parsed: ParsedDefect, commit_id: &str) -> Self {
        let file_name = parsed
            .filename
            .rsplit('/')
            .next()
            .unwrap_or(&parsed.filename)
            .to_string();
        Self {
            file_name,
            file_path: parsed.filename,
            commit_id: commit_id.to_string(),
            error_msg: parsed.error_msg,
            error_code: parsed.error_code,
            error_type: parsed.error_type,
            location: parsed.location,
            content: parsed.content,
        }
    }
}

/// A stored inspection batch.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionBatch {
    pub id: i64,
    /// Store row id of the project.
    pub project_row: i64,
    pub created_at: i64,
}

/// Which extraction strategy produced a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteSource {
    Frontend,
    ApiFramework,
    YardBase,
}

impl RouteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteSource::Frontend => "frontend",
            RouteSource::ApiFramework => "api-framework",
            RouteSource::YardBase => "yard-base",
        }
    }
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RouteSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frontend" => Ok(RouteSource::Frontend),
            "api-framework" => Ok(RouteSource::ApiFramework),
            "yard-base" => Ok(RouteSource::YardBase),
            other => Err(format!("unknown route source: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRecord {
    pub file: String,
    pub route: String,
    /// `None` when the strategy cannot tell ("unknown").
    pub line: Option<u32>,
    pub project_id: i64,
    pub source: RouteSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialUrlRecord {
    pub file: String,
    /// Connection URL with the credential segment redacted.
    pub url: String,
    pub line: u32,
    /// Source line, with the same redaction applied.
    pub text: String,
    pub project_id: i64,
}
