use crate::common::result::RepoResult;
use crate::domain::entities::{CommitInfo, ProjectId, ProjectRef};
use crate::domain::value_objects::RepoType;
use async_trait::async_trait;

/// Operations every repository backend provides.
///
/// Calls are keyed by project id and keep no per-project state between
/// calls; the working copy on disk is the only persisted state. `follow` and
/// the local history reads hold the project's lock for their whole duration.
/// `ping`, `follow` and `remote_branch_list` are bounded by the configured
/// network timeout and fail with `TimedOut` when it passes.
#[async_trait]
pub trait Repo: Send + Sync {
    /// Backend this implementation drives
    fn repo_type(&self) -> RepoType;

    /// Check that the remote is reachable and accepts the credentials in `url`.
    /// Never touches a working copy.
    async fn ping(&self, url: &str) -> RepoResult<()>;

    /// Prepare the project's local slot without fetching content. Idempotent.
    async fn create(&self, project_id: ProjectId) -> RepoResult<()>;

    /// Make the working copy exist and reflect `target`.
    async fn follow(&self, project: &ProjectRef, target: &str) -> RepoResult<()>;

    /// Branches at the remote; needs no working copy.
    async fn remote_branch_list(&self, url: &str) -> RepoResult<Vec<String>>;

    /// Branches visible in the local working copy.
    async fn branch_list(&self, project_id: ProjectId) -> RepoResult<Vec<String>>;

    /// History of the working copy, newest first, at most `rows` entries.
    async fn commit_log(&self, project_id: ProjectId, rows: usize) -> RepoResult<Vec<CommitInfo>>;

    /// History reachable from `branch`, newest first, at most `rows` entries.
    async fn branch_log(
        &self,
        project_id: ProjectId,
        branch: &str,
        rows: usize,
    ) -> RepoResult<Vec<CommitInfo>>;

    /// One entry per tag, newest tag first, at most `rows` entries.
    async fn tag_log(&self, project_id: ProjectId, rows: usize) -> RepoResult<Vec<CommitInfo>>;
}
