//! Fleet progress reporting.
//!
//! Fleet runs (`inspect-all`, `harvest`, `sync`) report which project is
//! being processed and how many are left. Progress is emitted on **stderr**
//! so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a fleet run.
#[derive(Clone, Debug)]
pub enum FleetProgressEvent {
    /// Directory listing in progress; total unknown.
    Listing { task: String },
    /// Project `n` of `total` is about to be processed.
    Project {
        task: String,
        n: u64,
        total: u64,
        name: String,
    },
    /// The run is over.
    Finished {
        task: String,
        ok: u64,
        failed: u64,
    },
}

/// Reports fleet progress. Implementations write to stderr (human or JSON).
pub trait FleetProgressReporter: Send + Sync {
    fn report(&self, event: FleetProgressEvent);
}

/// Human-friendly progress on stderr: "inspect  12 / 1,204  billing".
pub struct StderrProgress;

impl FleetProgressReporter for StderrProgress {
    fn report(&self, event: FleetProgressEvent) {
        let line = match &event {
            FleetProgressEvent::Listing { task } => format!("{}  listing projects...\n", task),
            FleetProgressEvent::Project {
                task,
                n,
                total,
                name,
            } => format!(
                "{}  {} / {}  {}\n",
                task,
                format_number(*n),
                format_number(*total),
                name
            ),
            FleetProgressEvent::Finished { task, ok, failed } => format!(
                "{}  done: {} ok, {} failed\n",
                task,
                format_number(*ok),
                format_number(*failed)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl FleetProgressReporter for JsonProgress {
    fn report(&self, event: FleetProgressEvent) {
        if let Ok(line) = serde_json::to_string(&event_json(&event)) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn event_json(event: &FleetProgressEvent) -> serde_json::Value {
    match event {
        FleetProgressEvent::Listing { task } => serde_json::json!({
            "event": "progress",
            "task": task,
            "phase": "listing"
        }),
        FleetProgressEvent::Project {
            task,
            n,
            total,
            name,
        } => serde_json::json!({
            "event": "progress",
            "task": task,
            "phase": "project",
            "n": n,
            "total": total,
            "project": name
        }),
        FleetProgressEvent::Finished { task, ok, failed } => serde_json::json!({
            "event": "finished",
            "task": task,
            "ok": ok,
            "failed": failed
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl FleetProgressReporter for NoProgress {
    fn report(&self, _event: FleetProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn FleetProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
