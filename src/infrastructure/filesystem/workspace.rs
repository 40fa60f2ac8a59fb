use crate::common::error::RepoError;
use crate::common::result::RepoResult;
use crate::domain::entities::ProjectId;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Layout of working copies on disk.
///
/// Every project owns exactly one directory, `<root>/project_<id>`. Staging
/// directories for in-flight transfers live next to it so that installing a
/// finished copy is a rename on the same filesystem.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working-copy path for a project; depends on the id alone.
    pub fn project_path(&self, project_id: ProjectId) -> PathBuf {
        self.root.join(format!("project_{}", project_id))
    }

    /// Create the project's slot directory; succeeds if it already exists.
    pub fn create_project_dir(&self, project_id: ProjectId) -> RepoResult<PathBuf> {
        let path = self.project_path(project_id);
        fs::create_dir_all(&path).map_err(|e| {
            RepoError::local_state_with_source("Failed to create working copy directory", &path, e)
        })?;
        Ok(path)
    }

    /// Path of an existing working copy, or `LocalState` when it is absent.
    pub fn require_project_dir(&self, project_id: ProjectId) -> RepoResult<PathBuf> {
        let path = self.project_path(project_id);
        if !path.is_dir() {
            return Err(RepoError::local_state("Working copy is missing", path));
        }
        Ok(path)
    }

    /// Fresh staging directory for a project. Removed on drop unless installed.
    pub fn staging_dir(&self, project_id: ProjectId) -> RepoResult<TempDir> {
        fs::create_dir_all(&self.root).map_err(|e| {
            RepoError::local_state_with_source("Failed to create workspace root", &self.root, e)
        })?;

        tempfile::Builder::new()
            .prefix(&format!(".project_{}.staging-", project_id))
            .tempdir_in(&self.root)
            .map_err(|e| {
                RepoError::local_state_with_source("Failed to create staging directory", &self.root, e)
            })
    }

    /// Replace the project's working copy with a completed staging directory.
    ///
    /// The previous copy is moved aside first and restored if the final
    /// rename fails, so the slot never ends up half-written.
    pub fn install(&self, project_id: ProjectId, staging: TempDir) -> RepoResult<()> {
        let target = self.project_path(project_id);
        let backup = self.root.join(format!(".project_{}.previous", project_id));

        if backup.exists() {
            fs::remove_dir_all(&backup).map_err(|e| {
                RepoError::local_state_with_source("Failed to remove stale backup", &backup, e)
            })?;
        }

        let had_previous = target.exists();
        if had_previous {
            fs::rename(&target, &backup).map_err(|e| {
                RepoError::local_state_with_source("Failed to move previous working copy aside", &target, e)
            })?;
        }

        let staged = staging.keep();
        if let Err(e) = fs::rename(&staged, &target) {
            if had_previous {
                let _ = fs::rename(&backup, &target);
            }
            let _ = fs::remove_dir_all(&staged);
            return Err(RepoError::local_state_with_source(
                "Failed to install working copy",
                &target,
                e,
            ));
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&backup) {
                tracing::warn!(path = %backup.display(), "failed to remove previous working copy: {}", e);
            }
        }

        Ok(())
    }
}
