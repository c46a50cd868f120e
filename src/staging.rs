//! Snapshot staging.
//!
//! A [`StagingArea`] is one run's private work directory
//! (`<root>/run-<uuid>`); separate runs never share files, so fleet workers
//! can stage concurrently. Inside it, [`StagingArea::acquire`] hands out a
//! [`Snapshot`] guard per project. The guard owns `<area>/<project>/` and the
//! analyzer report `<area>/<project>.txt` and removes both when dropped, on
//! success, skip and error paths alike.

use std::fs;
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use crate::error::{InspectError, InspectResult};
use crate::models::Project;
use crate::remote::VcsHost;

#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn create(base: &Path) -> InspectResult<Self> {
        let root = base.join(format!("run-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&root)
            .map_err(|e| InspectError::path(&root, format!("create staging area: {}", e)))?;
        tracing::debug!(root = %root.display(), "staging area created");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve an empty snapshot directory for `project_name`.
    pub fn acquire(&self, project_name: &str) -> InspectResult<Snapshot> {
        validate_name(&self.root, project_name)?;
        let dir = self.root.join(project_name);
        let report_path = self.root.join(format!("{}.txt", project_name));
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .map_err(|e| InspectError::path(&dir, format!("clear stale snapshot: {}", e)))?;
        }
        fs::create_dir_all(&dir)
            .map_err(|e| InspectError::path(&dir, format!("create snapshot dir: {}", e)))?;
        Ok(Snapshot {
            name: project_name.to_string(),
            staging_root: self.root.clone(),
            dir,
            report_path,
        })
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(root = %self.root.display(), error = %e, "failed to remove staging area");
            }
        }
    }
}

fn validate_name(root: &Path, name: &str) -> InspectResult<()> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if name.is_empty() || !single_normal || name.contains(['/', '\\']) {
        return Err(InspectError::path(
            root.join(name),
            format!("project name {:?} is not a plain directory name", name),
        ));
    }
    Ok(())
}

/// A project's materialized tree plus the location of its analyzer report.
#[derive(Debug)]
pub struct Snapshot {
    name: String,
    staging_root: PathBuf,
    dir: PathBuf,
    report_path: PathBuf,
}

impl Snapshot {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the commit's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The directory the analyzer runs in; report paths are relative to it.
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Extract a zip archive into the snapshot directory, dropping the single
    /// top-level directory the host wraps every entry in.
    pub fn unpack(&self, bytes: &[u8]) -> InspectResult<usize> {
        let archive_err = |reason: String| InspectError::Archive {
            project: self.name.clone(),
            reason,
        };
        let mut archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| archive_err(e.to_string()))?;

        let mut written = 0;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| archive_err(e.to_string()))?;
            let Some(enclosed) = entry.enclosed_name() else {
                return Err(archive_err(format!("unsafe entry path {:?}", entry.name())));
            };
            let relative: PathBuf = enclosed.components().skip(1).collect();
            if relative.as_os_str().is_empty() {
                continue;
            }
            let target = self.dir.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&target)
                    .map_err(|e| InspectError::path(&target, e.to_string()))?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| InspectError::path(parent, e.to_string()))?;
            }
            let mut out =
                fs::File::create(&target).map_err(|e| InspectError::path(&target, e.to_string()))?;
            io::copy(&mut entry, &mut out).map_err(|e| archive_err(e.to_string()))?;
            written += 1;
        }
        Ok(written)
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
        let _ = fs::remove_file(&self.report_path);
    }
}

/// Download `sha` of `project` and stage it.
pub async fn stage_commit(
    host: &dyn VcsHost,
    area: &StagingArea,
    project: &Project,
    sha: &str,
) -> InspectResult<Snapshot> {
    let snapshot = area.acquire(&project.name)?;
    let bytes = host.download_archive(project.id, sha).await?;
    let files = snapshot.unpack(&bytes)?;
    tracing::debug!(
        project_id = project.id,
        project = %project.name,
        commit = sha,
        files,
        "snapshot staged"
    );
    Ok(snapshot)
}
