pub mod commit_info;
pub mod project;

pub use commit_info::CommitInfo;
pub use project::{Credentials, ProjectId, ProjectRef};
