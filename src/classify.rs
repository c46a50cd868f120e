//! Project architecture classification.
//!
//! Decides which route-extraction strategy applies to a staged snapshot.
//! Conditions are checked in priority order, so exactly one kind wins.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::models::RouteSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectKind {
    /// `package.json` at the root.
    Frontend,
    /// `runserver.py` plus a root-level `bin/` directory.
    YardBase,
    /// `runserver.py` without `bin/`.
    ApiFramework,
    Other,
}

impl ProjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Frontend => "frontend",
            ProjectKind::YardBase => "yard-base",
            ProjectKind::ApiFramework => "api-framework",
            ProjectKind::Other => "other",
        }
    }

    /// The record tag for routes produced under this kind.
    pub fn route_source(&self) -> Option<RouteSource> {
        match self {
            ProjectKind::Frontend => Some(RouteSource::Frontend),
            ProjectKind::YardBase => Some(RouteSource::YardBase),
            ProjectKind::ApiFramework => Some(RouteSource::ApiFramework),
            ProjectKind::Other => None,
        }
    }
}

/// Relative file and directory paths of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct TreeListing {
    pub files: BTreeSet<PathBuf>,
    pub dirs: BTreeSet<PathBuf>,
}

impl TreeListing {
    pub fn scan(root: &Path) -> std::io::Result<Self> {
        let mut listing = TreeListing::default();
        for entry in WalkDir::new(root).min_depth(1) {
            let entry = entry.map_err(std::io::Error::other)?;
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            if entry.file_type().is_dir() {
                listing.dirs.insert(rel);
            } else if entry.file_type().is_file() {
                listing.files.insert(rel);
            }
        }
        Ok(listing)
    }

    fn has_root_file(&self, name: &str) -> bool {
        self.files.contains(Path::new(name))
    }

    fn has_root_dir(&self, name: &str) -> bool {
        self.dirs.contains(Path::new(name))
    }

    fn has_file_named(&self, name: &str) -> bool {
        self.files
            .iter()
            .any(|p| p.file_name().is_some_and(|n| n == name))
    }
}

pub fn classify(listing: &TreeListing) -> ProjectKind {
    if listing.has_root_file("package.json") {
        ProjectKind::Frontend
    } else if listing.has_file_named("runserver.py") {
        if listing.has_root_dir("bin") {
            ProjectKind::YardBase
        } else {
            ProjectKind::ApiFramework
        }
    } else {
        ProjectKind::Other
    }
}
