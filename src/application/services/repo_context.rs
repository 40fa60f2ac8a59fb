use super::project_locks::{ProjectGuard, ProjectLocks};
use crate::domain::entities::ProjectId;
use crate::infrastructure::filesystem::{RepoConfig, Workspace};
use std::sync::Arc;
use std::time::Duration;

/// Everything a driver needs besides its call arguments.
///
/// Passed explicitly into the factory; drivers hold no other state. Clones
/// share the same lock table, so every driver built from one context
/// serializes against the others on the same project id.
#[derive(Debug, Clone)]
pub struct RepoContext {
    workspace: Workspace,
    locks: ProjectLocks,
    config: Arc<RepoConfig>,
}

impl RepoContext {
    pub fn new(config: RepoConfig) -> Self {
        Self {
            workspace: Workspace::new(config.workspace_root.clone()),
            locks: ProjectLocks::new(),
            config: Arc::new(config),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    pub fn network_timeout(&self) -> Duration {
        self.config.network_timeout()
    }

    pub async fn lock_project(&self, project_id: ProjectId) -> ProjectGuard {
        self.locks.acquire(project_id).await
    }
}
