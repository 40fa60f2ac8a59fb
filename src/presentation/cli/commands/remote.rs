use anyhow::Result;
use colored::Colorize;

use crate::application::RepoContext;
use crate::infrastructure::repo::{Repo, RepoFactory};

/// Handler for `ping`
pub struct PingCommand {
    pub repo_type: String,
    pub url: String,
}

impl PingCommand {
    pub fn new(repo_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            repo_type: repo_type.into(),
            url: url.into(),
        }
    }

    pub async fn execute(&self, context: RepoContext) -> Result<()> {
        let repo = RepoFactory::get_repo(&self.repo_type, context)?;
        repo.ping(&self.url).await?;

        println!("{} {} remote is reachable", "✓".green().bold(), repo.repo_type());
        Ok(())
    }
}

/// Handler for `remote-branches`
pub struct RemoteBranchesCommand {
    pub repo_type: String,
    pub url: String,
}

impl RemoteBranchesCommand {
    pub fn new(repo_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            repo_type: repo_type.into(),
            url: url.into(),
        }
    }

    pub async fn execute(&self, context: RepoContext) -> Result<()> {
        let repo = RepoFactory::get_repo(&self.repo_type, context)?;
        for branch in repo.remote_branch_list(&self.url).await? {
            println!("{}", branch);
        }
        Ok(())
    }
}
