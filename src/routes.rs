//! Route extraction from staged project sources.
//!
//! One strategy per [`ProjectKind`]:
//!
//! - **yard-base**: handler classes under `src/app` deriving from the marker
//!   base class map to `/<dir>/<dashed-class-name>`.
//! - **api-framework**: `__init__.py` files register resources on the most
//!   recently declared blueprint.
//! - **frontend**: quoted URL-ish literals in script files.
//!
//! All strategies are line heuristics, not parsers.

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::classify::ProjectKind;
use crate::config::ExtractConfig;
use crate::credentials::is_comment;
use crate::error::{InspectError, InspectResult};
use crate::models::RouteRecord;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z]|\d)([A-Z])").unwrap());
static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["'`]([^"'`]+)["'`]"#).unwrap());
static URL_WITH_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'`](https?://[^"'`\s]+:[0-9]+[^"'`]*)["'`]"#).unwrap());
static ROOTED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'`](/[^"'`]*)["'`]"#).unwrap());

/// A route found in one file, before it is tagged with its project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundRoute {
    pub file: String,
    pub route: String,
    pub line: Option<u32>,
}

/// Run the strategy selected by `kind` over the snapshot at `root`.
pub fn extract_routes(
    kind: ProjectKind,
    root: &Path,
    project_id: i64,
    config: &ExtractConfig,
) -> InspectResult<Vec<RouteRecord>> {
    let found = match kind {
        ProjectKind::YardBase => yard_base_routes(root, &config.yard_base_marker),
        ProjectKind::ApiFramework => api_framework_routes(root),
        ProjectKind::Frontend => {
            frontend_routes(root, &config.frontend_extensions, &config.vendor_dir)?
        }
        ProjectKind::Other => Vec::new(),
    };
    let Some(source) = kind.route_source() else {
        return Ok(Vec::new());
    };
    Ok(found
        .into_iter()
        .map(|f| RouteRecord {
            file: f.file,
            route: f.route,
            line: f.line,
            project_id,
            source,
        })
        .collect())
}

/// `UserInfoApi.py` → `user-info-api`.
pub fn default_url_name(class_name: &str) -> String {
    CAMEL_BOUNDARY
        .replace_all(class_name, "${1}-${2}")
        .to_lowercase()
        .replace(".py", "")
}

pub fn yard_base_routes(root: &Path, marker: &str) -> Vec<FoundRoute> {
    let app_root = root.join("src").join("app");
    let mut routes = Vec::new();
    if !app_root.is_dir() {
        return routes;
    }

    for entry in WalkDir::new(&app_root).sort_by_file_name() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() || !has_extension(entry.path(), "py") {
            continue;
        }
        if entry
            .path()
            .components()
            .any(|c| c == Component::Normal("__pycache__".as_ref()))
        {
            continue;
        }
        let Some(text) = read_utf8(entry.path()) else {
            tracing::debug!(path = %entry.path().display(), "skipping undecodable file");
            continue;
        };

        let rel_dir = entry
            .path()
            .parent()
            .and_then(|p| p.strip_prefix(&app_root).ok())
            .map(slash_path)
            .unwrap_or_default();
        let prefix = format!("/{}", rel_dir.trim_start_matches('/'));

        for line in text.lines() {
            let Some(class_name) = handler_class_name(line, marker) else {
                continue;
            };
            let name = default_url_name(&class_name);
            let route = if prefix == "/" {
                format!("/{}", name)
            } else {
                format!("{}/{}", prefix, name)
            };
            routes.push(FoundRoute {
                file: relative(root, entry.path()),
                route,
                line: None,
            });
        }
    }
    routes
}

fn handler_class_name(line: &str, marker: &str) -> Option<String> {
    if !(line.contains("class") && line.contains(marker) && line.contains('(') && line.contains(')'))
    {
        return None;
    }
    let (_, rest) = line.split_once("class")?;
    let name: String = rest
        .split('(')
        .next()?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub fn api_framework_routes(root: &Path) -> Vec<FoundRoute> {
    let mut routes = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() || entry.file_name() != "__init__.py" {
            continue;
        }
        let Some(text) = read_utf8(entry.path()) else {
            tracing::debug!(path = %entry.path().display(), "skipping undecodable file");
            continue;
        };
        let file = relative(root, entry.path());
        routes.extend(
            blueprint_routes(&text)
                .into_iter()
                .map(|route| FoundRoute {
                    file: file.clone(),
                    route,
                    line: None,
                }),
        );
    }
    routes
}

/// Routes registered in one `__init__.py`, nested under the blueprint most
/// recently declared above each registration.
pub fn blueprint_routes(text: &str) -> Vec<String> {
    let mut blueprint: Option<String> = None;
    let mut routes = Vec::new();
    for line in text.lines() {
        if is_comment(line) {
            continue;
        }
        if line.contains("Blueprint(") {
            if let Some(name) = quoted_literals(line).into_iter().next() {
                blueprint = Some(name);
            }
        }
        if line.contains("add_resource(") {
            let literals = quoted_literals(line);
            let Some(path) = literals
                .iter()
                .take(2)
                .find(|l| l.starts_with('/'))
                .or_else(|| literals.first())
            else {
                continue;
            };
            match &blueprint {
                Some(bp) => routes.push(format!(
                    "/{}/{}",
                    bp.trim_matches('/'),
                    path.trim_start_matches('/')
                )),
                None => {
                    tracing::debug!(line = line.trim(), "resource registered before any blueprint");
                }
            }
        }
    }
    routes
}

fn quoted_literals(line: &str) -> Vec<String> {
    QUOTED
        .captures_iter(line)
        .map(|c| c[1].to_string())
        .collect()
}

pub fn frontend_routes(
    root: &Path,
    extensions: &[String],
    vendor_dir: &str,
) -> InspectResult<Vec<FoundRoute>> {
    let patterns: Vec<String> = extensions
        .iter()
        .map(|e| format!("**/*.{}", e.trim_start_matches('.')))
        .collect();
    let include = build_globset(&patterns).map_err(|e| InspectError::path(root, e.to_string()))?;
    let vendor_root = root.join(vendor_dir);

    let mut routes = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.path().starts_with(&vendor_root));
    for entry in walker {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let file = relative(root, entry.path());
        if !include.is_match(&file) {
            continue;
        }
        let text = read_utf8(entry.path()).ok_or_else(|| InspectError::Encoding {
            path: entry.path().to_path_buf(),
        })?;
        for (idx, line) in text.lines().enumerate() {
            if is_import_line(line) {
                continue;
            }
            for route in routes_in_line(line) {
                routes.push(FoundRoute {
                    file: file.clone(),
                    route,
                    line: Some(idx as u32 + 1),
                });
            }
        }
    }
    Ok(routes)
}

fn is_import_line(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("import ")
        || t.starts_with("import{")
        || (t.starts_with("export ") && t.contains(" from "))
        || t.contains("require(")
}

/// URL literals on one script line: absolute URLs with a port and
/// root-anchored paths, 5 to 99 characters, query string removed.
pub fn routes_in_line(line: &str) -> Vec<String> {
    let routes: BTreeSet<String> = URL_WITH_PORT
        .captures_iter(line)
        .chain(ROOTED_PATH.captures_iter(line))
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter(|s| !s.chars().any(|c| c.is_whitespace() || "<>()".contains(c)))
        .filter(|s| (5..100).contains(&s.chars().count()))
        .map(|s| s.split('?').next().unwrap_or(s).to_string())
        .collect();
    routes.into_iter().collect()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

pub(crate) fn read_utf8(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    String::from_utf8(bytes).ok()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e == ext)
}

fn slash_path(p: &Path) -> String {
    p.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn relative(root: &Path, path: &Path) -> String {
    slash_path(path.strip_prefix(root).unwrap_or(path))
}
