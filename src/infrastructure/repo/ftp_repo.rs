use super::repo_interface::Repo;
use super::transfer::{
    create_local_dir, local_file, remote_child, run_blocking, safe_entry_name, CancelFlag,
    TransferEndpoint,
};
use crate::application::services::RepoContext;
use crate::common::error::RepoError;
use crate::common::result::RepoResult;
use crate::domain::entities::{CommitInfo, Credentials, ProjectId, ProjectRef};
use crate::domain::value_objects::RepoType;
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use suppaftp::list::File as ListEntry;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};

const DEFAULT_PORT: u16 = 21;

/// Plain FTP driver. Mirrors a remote directory; no history.
pub struct FtpRepo {
    context: RepoContext,
}

impl FtpRepo {
    pub fn new(context: RepoContext) -> Self {
        Self { context }
    }

    fn synthetic_branch(&self) -> Vec<String> {
        vec![self.context.config().transfer.synthetic_branch.clone()]
    }

    async fn check_connection(&self, url: &str) -> RepoResult<()> {
        let endpoint = TransferEndpoint::parse(url, "ftp", DEFAULT_PORT, &Credentials::default())?;
        let timeout = self.context.network_timeout();

        run_blocking(timeout, move |_cancel| {
            let mut ftp = connect(&endpoint, timeout)?;
            ftp.noop().map_err(ftp_error)?;
            let _ = ftp.quit();
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Repo for FtpRepo {
    fn repo_type(&self) -> RepoType {
        RepoType::Ftp
    }

    #[tracing::instrument(skip(self, url))]
    async fn ping(&self, url: &str) -> RepoResult<()> {
        self.check_connection(url).await
    }

    async fn create(&self, _project_id: ProjectId) -> RepoResult<()> {
        Ok(())
    }

    #[tracing::instrument(skip(self, project), fields(project_id = project.id))]
    async fn follow(&self, project: &ProjectRef, target: &str) -> RepoResult<()> {
        let _guard = self.context.lock_project(project.id).await;
        if !target.trim().is_empty() {
            tracing::debug!(follow_target = %target, "ftp has no revisions; ignoring target");
        }

        let endpoint =
            TransferEndpoint::parse(&project.url, "ftp", DEFAULT_PORT, &project.credentials)?;
        let timeout = self.context.network_timeout();
        let workspace = self.context.workspace();
        let staging = workspace.staging_dir(project.id)?;
        let staging_path = staging.path().to_path_buf();

        let files = run_blocking(timeout, move |cancel| {
            let mut ftp = connect(&endpoint, timeout)?;
            let files = download_tree(&mut ftp, endpoint.path.as_deref(), &staging_path, &cancel)?;
            let _ = ftp.quit();
            Ok(files)
        })
        .await?;

        workspace.install(project.id, staging)?;
        tracing::info!(files, "ftp mirror installed");
        Ok(())
    }

    #[tracing::instrument(skip(self, url))]
    async fn remote_branch_list(&self, url: &str) -> RepoResult<Vec<String>> {
        self.check_connection(url).await?;
        Ok(self.synthetic_branch())
    }

    async fn branch_list(&self, _project_id: ProjectId) -> RepoResult<Vec<String>> {
        Ok(self.synthetic_branch())
    }

    async fn commit_log(&self, _project_id: ProjectId, _rows: usize) -> RepoResult<Vec<CommitInfo>> {
        Ok(Vec::new())
    }

    async fn branch_log(
        &self,
        _project_id: ProjectId,
        _branch: &str,
        _rows: usize,
    ) -> RepoResult<Vec<CommitInfo>> {
        Ok(Vec::new())
    }

    async fn tag_log(&self, _project_id: ProjectId, _rows: usize) -> RepoResult<Vec<CommitInfo>> {
        Ok(Vec::new())
    }
}

/// Connect, log in (anonymous when no credentials) and switch to binary mode
fn connect(endpoint: &TransferEndpoint, timeout: Duration) -> RepoResult<FtpStream> {
    let addr = endpoint.socket_addr()?;
    let mut ftp = FtpStream::connect_timeout(addr, timeout).map_err(ftp_error)?;
    ftp.get_ref()
        .set_read_timeout(Some(timeout))
        .and_then(|_| ftp.get_ref().set_write_timeout(Some(timeout)))
        .map_err(|e| RepoError::network("Failed to configure FTP socket", e.to_string()))?;

    let username = endpoint.credentials.username.as_deref().unwrap_or("anonymous");
    let password = endpoint.credentials.password.as_deref().unwrap_or("anonymous@");
    ftp.login(username, password).map_err(ftp_error)?;
    ftp.transfer_type(FileType::Binary).map_err(ftp_error)?;

    tracing::debug!(host = %endpoint.host, port = endpoint.port, username, "ftp session open");
    Ok(ftp)
}

/// Parse LIST output (POSIX `ls -l` or DOS style), dropping `total` lines.
fn parse_listing(lines: &[String]) -> RepoResult<Vec<ListEntry>> {
    lines
        .iter()
        .filter(|line| !line.trim().is_empty() && !line.starts_with("total "))
        .map(|line| {
            ListEntry::from_str(line).map_err(|e| {
                RepoError::parse("ftp", format!("cannot parse LIST line '{}': {}", line, e))
            })
        })
        .collect()
}

/// Recursively copy `remote` into `local`, streaming each file to disk.
/// Symlinks are skipped.
fn download_tree(
    ftp: &mut FtpStream,
    remote: Option<&str>,
    local: &Path,
    cancel: &CancelFlag,
) -> RepoResult<usize> {
    cancel.check()?;
    let listing = ftp.list(remote).map_err(ftp_error)?;
    let mut files = 0;

    for entry in parse_listing(&listing)? {
        let Some(name) = safe_entry_name(entry.name()) else {
            continue;
        };
        let remote_path = remote_child(remote, name);
        let local_path = local.join(name);

        if entry.is_symlink() {
            tracing::debug!(path = %remote_path, "skipping symlink");
        } else if entry.is_directory() {
            cancel.check()?;
            create_local_dir(&local_path)?;
            files += download_tree(ftp, Some(&remote_path), &local_path, cancel)?;
        } else {
            cancel.check()?;
            let mut file = local_file(&local_path)?;
            let bytes = ftp
                .retr(&remote_path, |reader| {
                    io::copy(reader, &mut file).map_err(FtpError::ConnectionError)
                })
                .map_err(ftp_error)?;
            tracing::trace!(path = %remote_path, bytes, "downloaded");
            files += 1;
        }
    }

    Ok(files)
}

fn ftp_error(error: FtpError) -> RepoError {
    match error {
        FtpError::ConnectionError(e) => {
            RepoError::network(format!("FTP connection failed: {}", e), e.to_string())
        }
        FtpError::UnexpectedResponse(response) => {
            let body = String::from_utf8_lossy(&response.body).trim().to_string();
            match response.status {
                Status::NotLoggedIn => RepoError::auth("FTP login rejected", body),
                Status::FileUnavailable => RepoError::not_found(format!("FTP path ({})", body)),
                status => RepoError::network(format!("FTP server replied {:?}", status), body),
            }
        }
        other => RepoError::network("FTP protocol error", other.to_string()),
    }
}
