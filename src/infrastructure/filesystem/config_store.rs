use crate::common::error::RepoError;
use crate::common::result::RepoResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Settings for the git driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GitSettings {
    #[validate(length(min = 1))]
    pub executable: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            executable: "git".to_string(),
        }
    }
}

/// Settings for the svn driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SvnSettings {
    #[validate(length(min = 1))]
    pub executable: String,

    /// Name reported for the followed line when the working copy sits at the repository root
    #[validate(length(min = 1, max = 255))]
    pub trunk: String,

    /// Repository-relative directory holding tags; tag history is empty when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255))]
    pub tags_path: Option<String>,
}

impl Default for SvnSettings {
    fn default() -> Self {
        Self {
            executable: "svn".to_string(),
            trunk: "trunk".to_string(),
            tags_path: None,
        }
    }
}

/// Settings shared by the ftp and sftp drivers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TransferSettings {
    /// Single branch name reported by transfer backends
    #[validate(length(min = 1, max = 255))]
    pub synthetic_branch: String,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            synthetic_branch: "virtual".to_string(),
        }
    }
}

/// Configuration of the repository layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RepoConfig {
    /// Directory under which every project's working copy lives
    #[validate(custom(function = "validate_workspace_root"))]
    pub workspace_root: PathBuf,

    /// Deadline for ping, follow and remote branch listing
    #[validate(range(min = 1, max = 3600))]
    pub network_timeout_secs: u64,

    #[validate(nested)]
    pub git: GitSettings,

    #[validate(nested)]
    pub svn: SvnSettings,

    #[validate(nested)]
    pub transfer: TransferSettings,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("repository"),
            network_timeout_secs: 300,
            git: GitSettings::default(),
            svn: SvnSettings::default(),
            transfer: TransferSettings::default(),
        }
    }
}

impl RepoConfig {
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn with_network_timeout(mut self, timeout_secs: u64) -> Self {
        self.network_timeout_secs = timeout_secs;
        self
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }
}

fn validate_workspace_root(root: &PathBuf) -> Result<(), ValidationError> {
    if root.as_os_str().is_empty() {
        return Err(ValidationError::new("workspace_root_empty"));
    }
    Ok(())
}

/// Loads [`RepoConfig`] from YAML files
pub struct ConfigStore;

impl ConfigStore {
    /// Read and validate the configuration at `config_path`
    pub fn load<P: AsRef<Path>>(config_path: P) -> RepoResult<RepoConfig> {
        let config_path = config_path.as_ref();

        if !config_path.exists() {
            return Err(RepoError::config(format!(
                "Configuration file not found at path: {}",
                config_path.display()
            )));
        }

        let contents = fs::read_to_string(config_path).map_err(|e| {
            RepoError::config_with_source(
                format!("Failed to read {}", config_path.display()),
                e,
            )
        })?;

        let config = Self::parse(&contents)?;
        tracing::debug!(path = %config_path.display(), "loaded repository configuration");
        Ok(config)
    }

    /// Parse and validate configuration from YAML text
    pub fn parse(contents: &str) -> RepoResult<RepoConfig> {
        let config: RepoConfig = serde_yaml::from_str(contents)
            .map_err(|e| RepoError::config_with_source("YAML parsing failed", e))?;

        config
            .validate()
            .map_err(|e| RepoError::config_with_source("Configuration validation failed", e))?;

        Ok(config)
    }
}
