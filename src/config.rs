use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub gitlab: GitLabConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub inspect: InspectConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitLabConfig {
    pub base_url: String,
    /// Private token. Falls back to `GITLAB_TOKEN` when unset.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_http_timeout_secs() -> u64 {
    120
}
fn default_per_page() -> u32 {
    100
}

impl GitLabConfig {
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GITLAB_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StagingConfig {
    /// Defaults to `staging/` next to the database file.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzerConfig {
    #[serde(default = "default_analyzer_command")]
    pub command: String,
    #[serde(default = "default_analyzer_args")]
    pub args: Vec<String>,
    /// Substring every defect line must contain (the scanned file extension).
    #[serde(default = "default_report_marker")]
    pub report_marker: String,
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    #[serde(default = "default_analyzer_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            command: default_analyzer_command(),
            args: default_analyzer_args(),
            report_marker: default_report_marker(),
            max_line_len: default_max_line_len(),
            timeout_secs: default_analyzer_timeout_secs(),
        }
    }
}

impl AnalyzerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_analyzer_command() -> String {
    "pylint".to_string()
}
fn default_analyzer_args() -> Vec<String> {
    vec![
        "--output-format=parseable".to_string(),
        "--exit-zero".to_string(),
    ]
}
fn default_report_marker() -> String {
    ".py".to_string()
}
fn default_max_line_len() -> usize {
    512
}
fn default_analyzer_timeout_secs() -> u64 {
    900
}

#[derive(Debug, Deserialize, Clone)]
pub struct InspectConfig {
    #[serde(default = "default_throttle_hours")]
    pub throttle_hours: i64,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            throttle_hours: default_throttle_hours(),
        }
    }
}

fn default_throttle_hours() -> i64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    /// Base class that marks a yard-base API handler.
    #[serde(default = "default_yard_base_marker")]
    pub yard_base_marker: String,
    #[serde(default = "default_frontend_extensions")]
    pub frontend_extensions: Vec<String>,
    #[serde(default = "default_vendor_dir")]
    pub vendor_dir: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            yard_base_marker: default_yard_base_marker(),
            frontend_extensions: default_frontend_extensions(),
            vendor_dir: default_vendor_dir(),
        }
    }
}

fn default_yard_base_marker() -> String {
    "AbstractApi".to_string()
}
fn default_frontend_extensions() -> Vec<String> {
    vec!["js".to_string(), "ts".to_string(), "tsx".to_string()]
}
fn default_vendor_dir() -> String {
    "node_modules".to_string()
}

impl Config {
    /// Staging root, resolved against the database location when unset.
    pub fn staging_root(&self) -> PathBuf {
        match &self.staging.root {
            Some(root) => root.clone(),
            None => self
                .db
                .path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("staging"),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.gitlab.base_url.trim().is_empty() {
        anyhow::bail!("gitlab.base_url must not be empty");
    }
    if config.gitlab.timeout_secs == 0 {
        anyhow::bail!("gitlab.timeout_secs must be > 0");
    }
    if config.gitlab.per_page == 0 {
        anyhow::bail!("gitlab.per_page must be > 0");
    }
    if config.analyzer.max_line_len == 0 {
        anyhow::bail!("analyzer.max_line_len must be > 0");
    }
    if config.analyzer.timeout_secs == 0 {
        anyhow::bail!("analyzer.timeout_secs must be > 0");
    }
    if config.analyzer.command.trim().is_empty() {
        anyhow::bail!("analyzer.command must not be empty");
    }
    if config.inspect.throttle_hours < 0 {
        anyhow::bail!("inspect.throttle_hours must be >= 0");
    }
    if config.extract.frontend_extensions.is_empty() {
        anyhow::bail!("extract.frontend_extensions must list at least one extension");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Config> {
        let config: Config = toml::from_str(s)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = parse(
            r#"
            [db]
            path = "/tmp/x/inspect.sqlite"

            [gitlab]
            base_url = "https://git.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.inspect.throttle_hours, 20);
        assert_eq!(cfg.analyzer.max_line_len, 512);
        assert_eq!(cfg.analyzer.report_marker, ".py");
        assert_eq!(cfg.extract.vendor_dir, "node_modules");
        assert_eq!(cfg.staging_root(), PathBuf::from("/tmp/x/staging"));
    }

    #[test]
    fn rejects_empty_base_url() {
        let err = parse(
            r#"
            [db]
            path = "a.sqlite"

            [gitlab]
            base_url = " "
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn rejects_negative_throttle() {
        let err = parse(
            r#"
            [db]
            path = "a.sqlite"

            [gitlab]
            base_url = "https://git.example.com"

            [inspect]
            throttle_hours = -1
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("throttle_hours"));
    }
}
