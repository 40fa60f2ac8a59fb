pub mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::exit;

use crate::application::RepoContext;
use crate::common::error::RepoError;
use crate::domain::entities::ProjectId;
use crate::infrastructure::filesystem::{ConfigStore, RepoConfig};

use commands::{
    BranchesCommand, CreateCommand, FollowCommand, LogCommand, PingCommand,
    RemoteBranchesCommand, TagsCommand,
};

/// repokit - drive git, svn, ftp and sftp sources through one interface
#[derive(Parser)]
#[command(name = "repokit")]
#[command(about = "Materialize and inspect project sources across git, svn, ftp and sftp")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (YAML)
    #[arg(long, global = true, env = "REPOKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the project working copies
    #[arg(long, global = true, env = "REPOKIT_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that a remote is reachable
    Ping {
        /// Repository type (git, svn, ftp, sftp)
        repo_type: String,
        url: String,
    },

    /// Prepare a project's local slot
    Create {
        /// Repository type (git, svn, ftp, sftp)
        repo_type: String,
        project_id: ProjectId,
    },

    /// Make a project's working copy reflect a branch, tag or revision
    Follow {
        /// Repository type (git, svn, ftp, sftp)
        repo_type: String,
        project_id: ProjectId,
        url: String,

        /// Branch, tag or revision (backend default when omitted)
        target: Option<String>,

        #[arg(long)]
        username: Option<String>,

        #[arg(long, env = "REPOKIT_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// SSH private key for git over ssh and sftp
        #[arg(long)]
        private_key: Option<PathBuf>,
    },

    /// List branches at a remote
    RemoteBranches {
        /// Repository type (git, svn, ftp, sftp)
        repo_type: String,
        url: String,
    },

    /// List branches of a project's working copy
    Branches {
        /// Repository type (git, svn, ftp, sftp)
        repo_type: String,
        project_id: ProjectId,
    },

    /// Show recent history as JSON
    Log {
        /// Repository type (git, svn, ftp, sftp)
        repo_type: String,
        project_id: ProjectId,

        /// Maximum number of entries
        #[arg(short = 'n', long, default_value_t = 10)]
        rows: usize,

        /// Show the history of this branch instead of the working copy
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Show tags, newest first, as JSON
    Tags {
        /// Repository type (git, svn, ftp, sftp)
        repo_type: String,
        project_id: ProjectId,

        /// Maximum number of entries
        #[arg(short = 'n', long, default_value_t = 10)]
        rows: usize,
    },
}

/// CLI application runner
pub struct CliApp {
    cli: Cli,
}

impl CliApp {
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    pub fn verbose(&self) -> bool {
        self.cli.verbose
    }

    pub async fn run(self) -> anyhow::Result<()> {
        match self.handle_command().await {
            Ok(_) => Ok(()),
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                if let Some(diagnostics) = e.downcast_ref::<RepoError>().and_then(RepoError::diagnostics) {
                    eprintln!("{}", diagnostics.dimmed());
                }
                exit(1);
            }
        }
    }

    /// Configuration from `--config` (or defaults) with `--workspace` applied
    fn load_context(&self) -> anyhow::Result<RepoContext> {
        let mut config = match &self.cli.config {
            Some(path) => ConfigStore::load(path)?,
            None => RepoConfig::default(),
        };
        if let Some(workspace) = &self.cli.workspace {
            config = config.with_workspace_root(workspace);
        }
        tracing::debug!(workspace = %config.workspace_root.display(), "using workspace");
        Ok(RepoContext::new(config))
    }

    async fn handle_command(&self) -> anyhow::Result<()> {
        let context = self.load_context()?;

        match &self.cli.command {
            Commands::Ping { repo_type, url } => PingCommand::new(repo_type, url).execute(context).await,
            Commands::Create {
                repo_type,
                project_id,
            } => CreateCommand::new(repo_type, *project_id).execute(context).await,
            Commands::Follow {
                repo_type,
                project_id,
                url,
                target,
                username,
                password,
                private_key,
            } => {
                FollowCommand::new(repo_type, *project_id, url, target.clone().unwrap_or_default())
                    .with_credentials(username.clone(), password.clone(), private_key.clone())
                    .execute(context)
                    .await
            }
            Commands::RemoteBranches { repo_type, url } => {
                RemoteBranchesCommand::new(repo_type, url).execute(context).await
            }
            Commands::Branches {
                repo_type,
                project_id,
            } => BranchesCommand::new(repo_type, *project_id).execute(context).await,
            Commands::Log {
                repo_type,
                project_id,
                rows,
                branch,
            } => {
                LogCommand::new(repo_type, *project_id, *rows, branch.clone())
                    .execute(context)
                    .await
            }
            Commands::Tags {
                repo_type,
                project_id,
                rows,
            } => TagsCommand::new(repo_type, *project_id, *rows).execute(context).await,
        }
    }
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_follow_with_defaults() {
        let cli = Cli::try_parse_from([
            "repokit",
            "follow",
            "git",
            "42",
            "https://git.example.com/shop.git",
        ])
        .unwrap();

        match cli.command {
            Commands::Follow {
                repo_type,
                project_id,
                target,
                username,
                ..
            } => {
                assert_eq!(repo_type, "git");
                assert_eq!(project_id, 42);
                assert_eq!(target, None);
                assert_eq!(username, None);
            }
            _ => panic!("Expected follow"),
        }
    }

    #[test]
    fn test_parse_log_options() {
        let cli = Cli::try_parse_from([
            "repokit", "log", "svn", "7", "-n", "3", "--branch", "trunk", "--workspace", "/srv/repo",
        ])
        .unwrap();

        assert_eq!(cli.workspace, Some(PathBuf::from("/srv/repo")));
        match cli.command {
            Commands::Log { rows, branch, .. } => {
                assert_eq!(rows, 3);
                assert_eq!(branch.as_deref(), Some("trunk"));
            }
            _ => panic!("Expected log"),
        }
    }

    #[test]
    fn test_project_id_must_be_numeric() {
        assert!(Cli::try_parse_from(["repokit", "create", "git", "abc"]).is_err());
    }
}
