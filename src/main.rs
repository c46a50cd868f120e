//! # repo-inspect CLI
//!
//! ## Usage
//!
//! ```bash
//! repo-inspect --config ./config/inspect.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repo-inspect init` | Create the SQLite database and tables |
//! | `repo-inspect sync` | Store projects, users, groups and memberships |
//! | `repo-inspect inspect <id>` | Inspect one project (`--name`, `--commit`) |
//! | `repo-inspect inspect-all` | Inspect every project, throttled |
//! | `repo-inspect harvest [routes\|urls\|all]` | Collect routes and connection URLs |
//! | `repo-inspect export routes\|urls` | Print harvested records as JSON |

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use repo_inspect::analyzer::CommandAnalyzer;
use repo_inspect::config::{self, Config};
use repo_inspect::connector_gitlab::GitLabHost;
use repo_inspect::directory::Directory;
use repo_inspect::export::{self, ExportKind};
use repo_inspect::harvest::{HarvestTarget, Harvester};
use repo_inspect::inspect::{InspectOutcome, Inspector, ProjectFailure, Throttle};
use repo_inspect::migrate;
use repo_inspect::progress::{FleetProgressEvent, FleetProgressReporter, ProgressMode};
use repo_inspect::report::ReportParser;
use repo_inspect::staging::StagingArea;
use repo_inspect::store::Store;
use repo_inspect::sync;

/// Audit the repositories of a GitLab host.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/inspect.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "repo-inspect",
    about = "Static-analysis inspection and route / connection-URL harvesting for GitLab projects",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/inspect.toml")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Store the host's projects, users, groups and memberships.
    ///
    /// Rows already stored (by remote id) are left alone.
    Sync {
        #[arg(long)]
        progress: Option<String>,
    },

    /// Inspect one project.
    ///
    /// The project must have been stored by `sync`. Without `--commit` the
    /// newest commit is inspected unless the project was inspected within
    /// the throttle window.
    Inspect {
        /// Remote project id.
        id: Option<i64>,

        /// Select the project by name instead; fails when the name is shared.
        #[arg(long, conflicts_with = "id")]
        name: Option<String>,

        /// Inspect this commit instead of the newest one. Skips the throttle.
        #[arg(long)]
        commit: Option<String>,
    },

    /// Inspect every project of the host.
    InspectAll {
        /// Progress output: `off`, `human` or `json`.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Collect routes and/or connection URLs from every project.
    ///
    /// The selected tables are replaced by this run's results.
    Harvest {
        #[arg(value_enum, default_value = "all")]
        target: HarvestArg,

        #[arg(long)]
        progress: Option<String>,
    },

    /// Export harvested records as JSON.
    Export {
        #[arg(value_enum)]
        kind: ExportArg,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HarvestArg {
    Routes,
    Urls,
    All,
}

impl From<HarvestArg> for HarvestTarget {
    fn from(a: HarvestArg) -> Self {
        match a {
            HarvestArg::Routes => HarvestTarget::Routes,
            HarvestArg::Urls => HarvestTarget::Urls,
            HarvestArg::All => HarvestTarget::All,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportArg {
    Routes,
    Urls,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("repo_inspect=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repo_inspect=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn progress_reporter(flag: Option<&str>) -> anyhow::Result<Box<dyn FleetProgressReporter>> {
    let mode = match flag {
        Some(s) => ProgressMode::parse(s)
            .with_context(|| format!("invalid --progress value '{}' (off, human, json)", s))?,
        None => ProgressMode::default_for_tty(),
    };
    Ok(mode.reporter())
}

fn print_failures(failures: &[ProjectFailure]) {
    for f in failures {
        println!("  failed  {} ({}): {}", f.project, f.project_id, f.error);
    }
}

async fn load_directory(
    host: &GitLabHost,
    progress: &dyn FleetProgressReporter,
) -> anyhow::Result<Directory> {
    progress.report(FleetProgressEvent::Listing {
        task: "directory".to_string(),
    });
    Directory::load(host)
        .await
        .context("Failed to list the GitLab directory")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { progress } => {
            let progress = progress_reporter(progress.as_deref())?;
            let host = GitLabHost::new(&cfg.gitlab)?;
            let store = Store::open(&cfg).await?;
            let directory = load_directory(&host, progress.as_ref()).await?;
            let summary =
                sync::sync_directory(&host, &store, &directory, Utc::now(), progress.as_ref())
                    .await?;
            println!(
                "Synced: {} projects, {} users, {} groups, {} project groups, {} project users, {} group users ({} listings failed)",
                summary.projects,
                summary.users,
                summary.groups,
                summary.project_groups,
                summary.project_users,
                summary.group_users,
                summary.failed_listings
            );
            store.close().await;
        }
        Commands::Inspect { id, name, commit } => {
            run_inspect(&cfg, id, name, commit).await?;
        }
        Commands::InspectAll { progress } => {
            let progress = progress_reporter(progress.as_deref())?;
            let host = GitLabHost::new(&cfg.gitlab)?;
            let store = Store::open(&cfg).await?;
            let directory = load_directory(&host, progress.as_ref()).await?;
            let area = StagingArea::create(&cfg.staging_root())?;
            let analyzer = CommandAnalyzer::new(&cfg.analyzer);
            let inspector = Inspector::new(&host, &analyzer, &store, &area)
                .with_parser(parser(&cfg))
                .with_throttle(Throttle::new(cfg.inspect.throttle_hours));

            let summary = inspector
                .inspect_all(&directory, Utc::now(), progress.as_ref())
                .await?;
            println!(
                "Inspected {} of {} projects: {} defects, {} clean, {} throttled, {} failed",
                summary.inspected,
                summary.total,
                summary.defects,
                summary.no_defects,
                summary.skipped_recent,
                summary.failures.len()
            );
            print_failures(&summary.failures);
            store.close().await;
        }
        Commands::Harvest { target, progress } => {
            let progress = progress_reporter(progress.as_deref())?;
            let host = GitLabHost::new(&cfg.gitlab)?;
            let store = Store::open(&cfg).await?;
            let directory = load_directory(&host, progress.as_ref()).await?;
            let area = StagingArea::create(&cfg.staging_root())?;
            let harvester = Harvester::new(&host, &area, &cfg.extract);

            let summary = harvester
                .harvest_all(
                    &directory,
                    target.into(),
                    &store,
                    Utc::now(),
                    progress.as_ref(),
                )
                .await?;
            println!(
                "Harvested {} routes and {} connection URLs from {} projects ({} failed)",
                summary.routes,
                summary.urls,
                summary.total,
                summary.failures.len()
            );
            print_failures(&summary.failures);
            store.close().await;
        }
        Commands::Export { kind, output } => {
            let store = Store::open(&cfg).await?;
            let kind = match kind {
                ExportArg::Routes => ExportKind::Routes,
                ExportArg::Urls => ExportKind::Urls,
            };
            export::run_export(&store, kind, output.as_deref()).await?;
            store.close().await;
        }
    }

    Ok(())
}

fn parser(cfg: &Config) -> ReportParser {
    ReportParser::new(cfg.analyzer.report_marker.clone(), cfg.analyzer.max_line_len)
}

async fn run_inspect(
    cfg: &Config,
    id: Option<i64>,
    name: Option<String>,
    commit: Option<String>,
) -> anyhow::Result<()> {
    let host = GitLabHost::new(&cfg.gitlab)?;
    let store = Store::open(cfg).await?;
    let directory = Directory::load(&host)
        .await
        .context("Failed to list the GitLab directory")?;

    let project = match (id, name) {
        (Some(id), _) => directory.project(id)?,
        (None, Some(name)) => directory.project_by_name(&name)?,
        (None, None) => bail!("give a project id or --name"),
    };

    let area = StagingArea::create(&cfg.staging_root())?;
    let analyzer = CommandAnalyzer::new(&cfg.analyzer);
    let inspector = Inspector::new(&host, &analyzer, &store, &area)
        .with_parser(parser(cfg))
        .with_throttle(Throttle::new(cfg.inspect.throttle_hours));

    let outcome = match commit {
        Some(sha) => inspector.inspect_commit_at(project, &sha, Utc::now()).await?,
        None => inspector.inspect_latest_at(project, Utc::now()).await?,
    };

    match outcome {
        InspectOutcome::SkippedRecent { last_batch_at } => {
            let when = chrono::DateTime::from_timestamp(last_batch_at, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| last_batch_at.to_string());
            println!(
                "{}: inspected at {}, within the {}h throttle window; skipped",
                project.name, when, cfg.inspect.throttle_hours
            );
        }
        InspectOutcome::NoDefects { commit } => {
            println!("{} @ {}: no defects reported", project.name, commit);
        }
        InspectOutcome::Done {
            commit,
            batch_id,
            defects,
        } => {
            println!(
                "{} @ {}: batch {} with {} defects",
                project.name, commit, batch_id, defects
            );
        }
    }
    store.close().await;
    Ok(())
}
