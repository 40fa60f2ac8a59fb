//! Test helper functions and utilities

use repokit::application::RepoContext;
use repokit::infrastructure::filesystem::RepoConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// A workspace root in a temporary directory plus the context built on it
pub struct TestWorkspace {
    pub dir: TempDir,
    pub context: RepoContext,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Adjust the default configuration before building the context
    pub fn with_config(adjust: impl FnOnce(RepoConfig) -> RepoConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create workspace directory");
        let config = adjust(
            RepoConfig::default()
                .with_workspace_root(dir.path())
                .with_network_timeout(60),
        );
        let context = RepoContext::new(config);
        Self { dir, context }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn project_path(&self, project_id: i64) -> PathBuf {
        self.context.workspace().project_path(project_id)
    }

    /// Entries directly under the workspace root
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.root())
            .expect("Failed to read workspace root")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Relative path -> file contents for every file under `root`, skipping
/// version-control metadata.
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git" && e.file_name() != ".svn")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e
                .path()
                .strip_prefix(root)
                .expect("entry under root")
                .to_string_lossy()
                .into_owned();
            let contents = std::fs::read(e.path()).expect("Failed to read file");
            (relative, contents)
        })
        .collect()
}
