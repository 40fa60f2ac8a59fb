use super::ftp_repo::FtpRepo;
use super::git_repo::GitRepo;
use super::repo_interface::Repo;
use super::sftp_repo::SftpRepo;
use super::svn_repo::SvnRepo;
use crate::application::services::RepoContext;
use crate::common::result::RepoResult;
use crate::domain::entities::{CommitInfo, ProjectId, ProjectRef};
use crate::domain::value_objects::RepoType;
use async_trait::async_trait;

/// The closed set of drivers, dispatched by `match`.
pub enum RepoDriver {
    Git(GitRepo),
    Svn(SvnRepo),
    Ftp(FtpRepo),
    Sftp(SftpRepo),
}

impl RepoDriver {
    fn as_repo(&self) -> &dyn Repo {
        match self {
            RepoDriver::Git(repo) => repo,
            RepoDriver::Svn(repo) => repo,
            RepoDriver::Ftp(repo) => repo,
            RepoDriver::Sftp(repo) => repo,
        }
    }
}

impl std::fmt::Debug for RepoDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RepoDriver").field(&self.repo_type()).finish()
    }
}

#[async_trait]
impl Repo for RepoDriver {
    fn repo_type(&self) -> RepoType {
        match self {
            RepoDriver::Git(_) => RepoType::Git,
            RepoDriver::Svn(_) => RepoType::Svn,
            RepoDriver::Ftp(_) => RepoType::Ftp,
            RepoDriver::Sftp(_) => RepoType::Sftp,
        }
    }

    async fn ping(&self, url: &str) -> RepoResult<()> {
        self.as_repo().ping(url).await
    }

    async fn create(&self, project_id: ProjectId) -> RepoResult<()> {
        self.as_repo().create(project_id).await
    }

    async fn follow(&self, project: &ProjectRef, target: &str) -> RepoResult<()> {
        self.as_repo().follow(project, target).await
    }

    async fn remote_branch_list(&self, url: &str) -> RepoResult<Vec<String>> {
        self.as_repo().remote_branch_list(url).await
    }

    async fn branch_list(&self, project_id: ProjectId) -> RepoResult<Vec<String>> {
        self.as_repo().branch_list(project_id).await
    }

    async fn commit_log(&self, project_id: ProjectId, rows: usize) -> RepoResult<Vec<CommitInfo>> {
        self.as_repo().commit_log(project_id, rows).await
    }

    async fn branch_log(
        &self,
        project_id: ProjectId,
        branch: &str,
        rows: usize,
    ) -> RepoResult<Vec<CommitInfo>> {
        self.as_repo().branch_log(project_id, branch, rows).await
    }

    async fn tag_log(&self, project_id: ProjectId, rows: usize) -> RepoResult<Vec<CommitInfo>> {
        self.as_repo().tag_log(project_id, rows).await
    }
}

/// Factory for repository drivers
pub struct RepoFactory;

impl RepoFactory {
    /// Driver for a configuration tag (`git`, `svn`, `ftp`, `sftp`).
    ///
    /// Any other tag is `UnsupportedRepoType`.
    pub fn get_repo(tag: &str, context: RepoContext) -> RepoResult<RepoDriver> {
        let repo_type: RepoType = tag.parse()?;
        Ok(Self::for_type(repo_type, context))
    }

    pub fn for_type(repo_type: RepoType, context: RepoContext) -> RepoDriver {
        match repo_type {
            RepoType::Git => RepoDriver::Git(GitRepo::new(context)),
            RepoType::Svn => RepoDriver::Svn(SvnRepo::new(context)),
            RepoType::Ftp => RepoDriver::Ftp(FtpRepo::new(context)),
            RepoType::Sftp => RepoDriver::Sftp(SftpRepo::new(context)),
        }
    }

    /// Driver for a project's configured backend
    pub fn for_project(project: &ProjectRef, context: RepoContext) -> RepoDriver {
        Self::for_type(project.repo_type, context)
    }
}
