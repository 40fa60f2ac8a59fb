pub mod config_store;
pub mod workspace;

pub use config_store::{ConfigStore, GitSettings, RepoConfig, SvnSettings, TransferSettings};
pub use workspace::Workspace;
