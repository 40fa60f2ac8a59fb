/// Application layer: shared state handed to every driver
pub mod services;

pub use services::{ProjectGuard, ProjectLocks, RepoContext};
