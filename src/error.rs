//! Per-project failure taxonomy for the inspection and harvest pipelines.
//!
//! Fleet loops absorb every variant except the fatal ones, logging the
//! project identity and moving on to the next project.

use std::path::PathBuf;
use thiserror::Error;

pub type InspectResult<T> = std::result::Result<T, InspectError>;

#[derive(Debug, Error)]
pub enum InspectError {
    /// The project has no commits; nothing to stage.
    #[error("project {0} has no commit")]
    NoCommit(String),

    #[error("commit {commit} not found in project {project}")]
    CommitNotFound { project: String, commit: String },

    #[error("project id {0} is not in the directory")]
    UnknownProject(i64),

    #[error("invalid staging path {}: {reason}", path.display())]
    Path { path: PathBuf, reason: String },

    #[error("corrupt archive for {project}: {reason}")]
    Archive { project: String, reason: String },

    #[error("undecodable text in {}", path.display())]
    Encoding { path: PathBuf },

    /// A call to the VCS host failed.
    #[error("remote listing failed: {0}")]
    RemoteListing(String),

    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },

    #[error("analyzer failed: {0}")]
    Tool(String),

    /// The store does not hold exactly one row for the project.
    #[error("consistency error: {0}")]
    Consistency(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl InspectError {
    /// Fatal errors point at a data-integrity or storage problem wider than a
    /// single project and must stop a fleet run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, InspectError::Consistency(_) | InspectError::Store(_))
    }

    pub fn path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        InspectError::Path {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_consistency_and_store_are_fatal() {
        assert!(InspectError::Consistency("2 rows".into()).is_fatal());
        assert!(InspectError::Store(sqlx::Error::RowNotFound).is_fatal());
        assert!(!InspectError::NoCommit("p".into()).is_fatal());
        assert!(!InspectError::RemoteListing("503".into()).is_fatal());
        assert!(!InspectError::Timeout {
            what: "pylint".into(),
            secs: 1
        }
        .is_fatal());
    }

    #[test]
    fn messages_name_the_project() {
        let e = InspectError::NoCommit("billing".into());
        assert_eq!(e.to_string(), "project billing has no commit");
    }
}
