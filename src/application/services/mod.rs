pub mod project_locks;
pub mod repo_context;

pub use project_locks::{ProjectGuard, ProjectLocks};
pub use repo_context::RepoContext;
