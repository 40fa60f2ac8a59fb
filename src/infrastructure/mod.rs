/// Infrastructure layer modules
///
/// This layer provides concrete implementations for external system interactions:
/// - Repository drivers (git, svn, ftp, sftp)
/// - File system operations (configuration, working-copy layout)
/// - Process execution for the `git` and `svn` executables
pub mod filesystem;
pub mod process;
pub mod repo;

// Re-export commonly used types
pub use filesystem::{ConfigStore, RepoConfig, Workspace};
pub use process::CommandExecutor;
pub use repo::{Repo, RepoDriver, RepoFactory};
