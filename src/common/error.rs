use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by every repository driver.
///
/// Callers react differently per variant: `Network` and `TimedOut` are
/// transient, `Auth` aborts a deployment, `NotFound` on a history query may be
/// treated as an empty result, and `Parse` always indicates format drift in
/// the backend tool.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Network error: {message}")]
    Network { message: String, diagnostics: String },

    #[error("Authentication rejected: {message}")]
    Auth { message: String, diagnostics: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Unexpected {backend} output: {message}")]
    Parse { backend: String, message: String },

    #[error("Operation timed out after {timeout_secs} seconds")]
    TimedOut { timeout_secs: u64 },

    #[error("Unsupported repository type: '{0}'. Supported types are: git, svn, ftp, sftp")]
    UnsupportedRepoType(String),

    #[error("Working copy error at {}: {message}", path.display())]
    LocalState {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Command execution failed: {command}, exit code: {exit_code}, stderr: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RepoError {
    pub fn network(message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn auth(message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn parse(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn timed_out(timeout_secs: u64) -> Self {
        Self::TimedOut { timeout_secs }
    }

    pub fn local_state(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::LocalState {
            message: message.into(),
            path: path.into(),
            source: None,
        }
    }

    pub fn local_state_with_source(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::LocalState {
            message: message.into(),
            path: path.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Output of the underlying transport, when there is any to show the operator.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Network { diagnostics, .. } | Self::Auth { diagnostics, .. } => {
                Some(diagnostics.as_str()).filter(|d| !d.is_empty())
            }
            Self::CommandFailed { stderr, .. } => Some(stderr.as_str()).filter(|d| !d.is_empty()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Network failures and timeouts; the scheduler may retry these after backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::TimedOut { .. })
    }
}
