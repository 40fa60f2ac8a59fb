use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::application::RepoContext;
use crate::domain::entities::{Credentials, ProjectId, ProjectRef};
use crate::infrastructure::repo::{Repo, RepoFactory};

/// Handler for `create`
pub struct CreateCommand {
    pub repo_type: String,
    pub project_id: ProjectId,
}

impl CreateCommand {
    pub fn new(repo_type: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            repo_type: repo_type.into(),
            project_id,
        }
    }

    pub async fn execute(&self, context: RepoContext) -> Result<()> {
        let repo = RepoFactory::get_repo(&self.repo_type, context)?;
        repo.create(self.project_id).await?;

        println!("{} Prepared project {}", "✓".green().bold(), self.project_id);
        Ok(())
    }
}

/// Handler for `follow`
pub struct FollowCommand {
    pub repo_type: String,
    pub project_id: ProjectId,
    pub url: String,
    pub target: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
}

impl FollowCommand {
    pub fn new(
        repo_type: impl Into<String>,
        project_id: ProjectId,
        url: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            repo_type: repo_type.into(),
            project_id,
            url: url.into(),
            target: target.into(),
            username: None,
            password: None,
            private_key: None,
        }
    }

    pub fn with_credentials(
        mut self,
        username: Option<String>,
        password: Option<String>,
        private_key: Option<PathBuf>,
    ) -> Self {
        self.username = username;
        self.password = password;
        self.private_key = private_key;
        self
    }

    pub async fn execute(&self, context: RepoContext) -> Result<()> {
        let repo = RepoFactory::get_repo(&self.repo_type, context)?;

        let credentials = Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            private_key: self.private_key.clone(),
        };
        let project = ProjectRef::new(self.project_id, repo.repo_type(), &self.url)
            .with_credentials(credentials);

        println!("{} Following project {}...", "::".blue().bold(), self.project_id);
        repo.follow(&project, &self.target).await?;

        let target = if self.target.is_empty() {
            "default".to_string()
        } else {
            self.target.clone()
        };
        println!(
            "{} Project {} is at {}",
            "✓".green().bold(),
            self.project_id,
            target.cyan()
        );
        Ok(())
    }
}
