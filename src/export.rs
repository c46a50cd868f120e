//! Export harvested routes and connection URLs as JSON.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Routes,
    Urls,
}

#[derive(Serialize)]
struct ExportData<T> {
    kind: &'static str,
    count: usize,
    records: Vec<T>,
}

/// Render the current contents of one harvest table as pretty JSON.
pub async fn render(store: &Store, kind: ExportKind) -> Result<(String, usize)> {
    let (json, count) = match kind {
        ExportKind::Routes => {
            let records = store.load_routes().await?;
            let count = records.len();
            let data = ExportData {
                kind: "routes",
                count,
                records,
            };
            (serde_json::to_string_pretty(&data)?, count)
        }
        ExportKind::Urls => {
            let records = store.load_credential_urls().await?;
            let count = records.len();
            let data = ExportData {
                kind: "urls",
                count,
                records,
            };
            (serde_json::to_string_pretty(&data)?, count)
        }
    };
    Ok((json, count))
}

/// If `output` is `Some`, writes to that file path. Otherwise writes to
/// stdout for piping.
pub async fn run_export(store: &Store, kind: ExportKind, output: Option<&Path>) -> Result<()> {
    let (json, count) = render(store, kind).await?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            tracing::info!(count, path = %path.display(), "export written");
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}
