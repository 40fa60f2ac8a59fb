use anyhow::Result;

use crate::application::RepoContext;
use crate::domain::entities::{CommitInfo, ProjectId};
use crate::infrastructure::repo::{Repo, RepoFactory};

/// Handler for `branches`
pub struct BranchesCommand {
    pub repo_type: String,
    pub project_id: ProjectId,
}

impl BranchesCommand {
    pub fn new(repo_type: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            repo_type: repo_type.into(),
            project_id,
        }
    }

    pub async fn execute(&self, context: RepoContext) -> Result<()> {
        let repo = RepoFactory::get_repo(&self.repo_type, context)?;
        for branch in repo.branch_list(self.project_id).await? {
            println!("{}", branch);
        }
        Ok(())
    }
}

/// Handler for `log`; `--branch` switches from the working copy's history
/// to the history of one branch.
pub struct LogCommand {
    pub repo_type: String,
    pub project_id: ProjectId,
    pub rows: usize,
    pub branch: Option<String>,
}

impl LogCommand {
    pub fn new(
        repo_type: impl Into<String>,
        project_id: ProjectId,
        rows: usize,
        branch: Option<String>,
    ) -> Self {
        Self {
            repo_type: repo_type.into(),
            project_id,
            rows,
            branch,
        }
    }

    pub async fn execute(&self, context: RepoContext) -> Result<()> {
        let repo = RepoFactory::get_repo(&self.repo_type, context)?;
        let history = match &self.branch {
            Some(branch) => repo.branch_log(self.project_id, branch, self.rows).await?,
            None => repo.commit_log(self.project_id, self.rows).await?,
        };
        print_history(&history)
    }
}

/// Handler for `tags`
pub struct TagsCommand {
    pub repo_type: String,
    pub project_id: ProjectId,
    pub rows: usize,
}

impl TagsCommand {
    pub fn new(repo_type: impl Into<String>, project_id: ProjectId, rows: usize) -> Self {
        Self {
            repo_type: repo_type.into(),
            project_id,
            rows,
        }
    }

    pub async fn execute(&self, context: RepoContext) -> Result<()> {
        let repo = RepoFactory::get_repo(&self.repo_type, context)?;
        let history = repo.tag_log(self.project_id, self.rows).await?;
        print_history(&history)
    }
}

fn print_history(history: &[CommitInfo]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(history)?);
    Ok(())
}
