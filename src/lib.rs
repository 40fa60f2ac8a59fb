//! # repokit - repository abstraction for deployment pipelines
//!
//! `repokit` gives a deployment pipeline one way to talk to wherever a
//! project's source lives: a git or Subversion repository, or a plain
//! directory behind FTP or SFTP. Every backend implements the same eight
//! operations, and every history query returns the same [`CommitInfo`]
//! record.
//!
//! ## Operations
//!
//! - `ping`: is the remote reachable with these credentials?
//! - `create`: prepare a project's local slot
//! - `follow`: make the working copy reflect a branch, tag or revision
//! - `remote_branch_list` / `branch_list`: branches at the remote / in the working copy
//! - `commit_log` / `branch_log` / `tag_log`: recent history, newest first
//!
//! Every project owns one working copy under the workspace root,
//! `<root>/project_<id>`. Operations on one project are serialized; operations
//! on different projects run in parallel.
//!
//! ## Architecture
//!
//! - [`domain`]: the records exchanged with callers (`CommitInfo`, `ProjectRef`, `RepoType`)
//! - [`application`]: the context every driver shares (workspace, locks, configuration)
//! - [`infrastructure`]: the drivers, the factory, configuration loading and process execution
//! - [`presentation`]: the `repokit` command line
//! - [`common`]: error taxonomy and result helpers
//!
//! ## Example
//!
//! ```rust,no_run
//! use repokit::application::RepoContext;
//! use repokit::domain::entities::ProjectRef;
//! use repokit::domain::value_objects::RepoType;
//! use repokit::infrastructure::filesystem::RepoConfig;
//! use repokit::infrastructure::repo::{Repo, RepoFactory};
//!
//! # async fn example() -> repokit::Result<()> {
//! let context = RepoContext::new(RepoConfig::default().with_workspace_root("/srv/repository"));
//! let repo = RepoFactory::get_repo("git", context)?;
//!
//! let project = ProjectRef::new(42, RepoType::Git, "https://git.example.com/shop.git");
//! repo.follow(&project, "main").await?;
//!
//! for entry in repo.commit_log(project.id, 10).await? {
//!     println!("{} {} {}", entry.commit, entry.author, entry.message);
//! }
//! # Ok(())
//! # }
//! ```

// Documentation attributes
#![deny(rustdoc::broken_intra_doc_links)]

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types for convenience
pub use crate::common::error::RepoError;
pub use crate::common::result::RepoResult as Result;
pub use crate::domain::entities::CommitInfo;
