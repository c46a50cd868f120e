//! External static-analysis tool.
//!
//! The tool is a black box: it runs over a staged snapshot and produces a
//! free-text report. [`CommandAnalyzer`] spawns it as a subprocess in the
//! staging root with the snapshot directory name as its last argument, so
//! paths in the report read `<project>/<path inside the commit>`.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;

use crate::config::AnalyzerConfig;
use crate::error::{InspectError, InspectResult};
use crate::staging::Snapshot;

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze `snapshot` and return the decoded report text.
    async fn run(&self, snapshot: &Snapshot) -> InspectResult<String>;
}

pub struct CommandAnalyzer {
    command: String,
    args: Vec<String>,
    timeout_secs: u64,
}

impl CommandAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait]
impl Analyzer for CommandAnalyzer {
    async fn run(&self, snapshot: &Snapshot) -> InspectResult<String> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(&self.args)
            .arg(snapshot.name())
            .current_dir(snapshot.staging_root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| InspectError::Tool(format!("failed to spawn {}: {}", self.command, e)))?;

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| InspectError::Timeout {
            what: format!("{} on {}", self.command, snapshot.name()),
            secs: self.timeout_secs,
        })?
        .map_err(|e| InspectError::Tool(format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InspectError::Tool(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        tokio::fs::write(snapshot.report_path(), &output.stdout)
            .await
            .map_err(|e| InspectError::path(snapshot.report_path(), e.to_string()))?;
        read_report(snapshot.report_path())
    }
}

/// Read a report file as UTF-8.
pub fn read_report(path: &Path) -> InspectResult<String> {
    let bytes = std::fs::read(path).map_err(|e| InspectError::path(path, e.to_string()))?;
    String::from_utf8(bytes).map_err(|_| InspectError::Encoding {
        path: path.to_path_buf(),
    })
}
