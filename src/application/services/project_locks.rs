use crate::domain::entities::ProjectId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per project id.
///
/// Locks are created on first use and kept for the life of the process.
/// Different project ids never contend with each other.
#[derive(Debug, Clone, Default)]
pub struct ProjectLocks {
    locks: Arc<Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>>,
}

/// Exclusive access to one project's working copy; released on drop.
#[derive(Debug)]
pub struct ProjectGuard {
    project_id: ProjectId,
    _guard: OwnedMutexGuard<()>,
}

impl ProjectGuard {
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `project_id`.
    pub async fn acquire(&self, project_id: ProjectId) -> ProjectGuard {
        let lock = self.lock_for(project_id);
        let guard = lock.lock_owned().await;
        tracing::trace!(project_id, "acquired project lock");
        ProjectGuard {
            project_id,
            _guard: guard,
        }
    }

    /// Number of project ids seen so far
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, project_id: ProjectId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(project_id).or_default().clone()
    }
}
