/// Repository drivers
///
/// One contract, [`Repo`], implemented for git, svn, ftp and sftp, and a
/// factory that maps a project's configured type tag to its driver.
pub mod ftp_repo;
pub mod git_repo;
pub mod repo_factory;
pub mod repo_interface;
pub mod sftp_repo;
pub mod svn_repo;
pub mod transfer;

pub use ftp_repo::FtpRepo;
pub use git_repo::GitRepo;
pub use repo_factory::{RepoDriver, RepoFactory};
pub use repo_interface::Repo;
pub use sftp_repo::SftpRepo;
pub use svn_repo::SvnRepo;
