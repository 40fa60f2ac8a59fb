use super::repo_interface::Repo;
use super::transfer::{
    create_local_dir, local_file, run_blocking, safe_entry_name, CancelFlag, TransferEndpoint,
};
use crate::application::services::RepoContext;
use crate::common::error::RepoError;
use crate::common::result::RepoResult;
use crate::domain::entities::{CommitInfo, Credentials, ProjectId, ProjectRef};
use crate::domain::value_objects::RepoType;
use async_trait::async_trait;
use ssh2::{ErrorCode, Session, Sftp};
use std::io;
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

const DEFAULT_PORT: u16 = 22;

// libssh2 error codes
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED: i32 = -19;
const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;
const LIBSSH2_FX_PERMISSION_DENIED: i32 = 3;
const LIBSSH2_FX_NO_SUCH_PATH: i32 = 10;

/// SFTP driver over libssh2. Mirrors a remote directory; no history.
pub struct SftpRepo {
    context: RepoContext,
}

impl SftpRepo {
    pub fn new(context: RepoContext) -> Self {
        Self { context }
    }

    fn synthetic_branch(&self) -> Vec<String> {
        vec![self.context.config().transfer.synthetic_branch.clone()]
    }

    async fn check_connection(&self, url: &str) -> RepoResult<()> {
        let endpoint = TransferEndpoint::parse(url, "sftp", DEFAULT_PORT, &Credentials::default())?;
        let timeout = self.context.network_timeout();

        run_blocking(timeout, move |_cancel| {
            let session = connect(&endpoint, timeout)?;
            session.sftp().map_err(ssh_error)?;
            let _ = session.disconnect(None, "ping", None);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Repo for SftpRepo {
    fn repo_type(&self) -> RepoType {
        RepoType::Sftp
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
            tracing::debug!(follow_target = %target, "sftp has no revisions; ignoring target");
        }

        let endpoint =
            TransferEndpoint::parse(&project.url, "sftp", DEFAULT_PORT, &project.credentials)?;
        let timeout = self.context.network_timeout();
        let workspace = self.context.workspace();
        let staging = workspace.staging_dir(project.id)?;
        let staging_path = staging.path().to_path_buf();

        let files = run_blocking(timeout, move |cancel| {
            let session = connect(&endpoint, timeout)?;
            let sftp = session.sftp().map_err(ssh_error)?;
            let root = endpoint.path.clone().unwrap_or_else(|| ".".to_string());
            let files = download_tree(&sftp, Path::new(&root), &staging_path, &cancel)?;
            let _ = session.disconnect(None, "done", None);
            Ok(files)
        })
        .await?;

        workspace.install(project.id, staging)?;
        tracing::info!(files, "sftp mirror installed");
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

/// Open an authenticated session.
///
/// Tries the password, then the private key file, then the ssh agent.
fn connect(endpoint: &TransferEndpoint, timeout: Duration) -> RepoResult<Session> {
    let addr = endpoint.socket_addr()?;
    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
        RepoError::network(format!("Cannot connect to {}", addr), e.to_string())
    })?;

    let mut session = Session::new().map_err(ssh_error)?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session.handshake().map_err(ssh_error)?;

    let credentials = &endpoint.credentials;
    let username = credentials
        .username
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "root".to_string());

    let mut last_error = None;
    if let Some(password) = &credentials.password {
        if let Err(e) = session.userauth_password(&username, password) {
            last_error = Some(e);
        }
    }
    if !session.authenticated() {
        if let Some(key) = &credentials.private_key {
            if let Err(e) = session.userauth_pubkey_file(&username, None, key, None) {
                last_error = Some(e);
            }
        }
    }
    if !session.authenticated() {
        if let Err(e) = session.userauth_agent(&username) {
            last_error = Some(e);
        }
    }

    if !session.authenticated() {
        let diagnostics = last_error.map(|e| e.to_string()).unwrap_or_default();
        return Err(RepoError::auth(
            format!("SFTP login rejected for user '{}'", username),
            diagnostics,
        ));
    }

    tracing::debug!(host = %endpoint.host, port = endpoint.port, username = %username, "sftp session open");
    Ok(session)
}

/// Recursively copy `remote` into `local`. Symlinks are skipped.
fn download_tree(sftp: &Sftp, remote: &Path, local: &Path, cancel: &CancelFlag) -> RepoResult<usize> {
    cancel.check()?;
    let mut files = 0;

    for (remote_path, stat) in sftp.readdir(remote).map_err(ssh_error)? {
        let Some(name) = remote_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(safe_entry_name)
        else {
            continue;
        };
        let local_path = local.join(name);

        if stat.file_type().is_symlink() {
            tracing::debug!(path = %remote_path.display(), "skipping symlink");
        } else if stat.is_dir() {
            cancel.check()?;
            create_local_dir(&local_path)?;
            files += download_tree(sftp, &remote_path, &local_path, cancel)?;
        } else if stat.is_file() {
            cancel.check()?;
            let mut remote_file = sftp.open(&remote_path).map_err(ssh_error)?;
            let mut file = local_file(&local_path)?;
            io::copy(&mut remote_file, &mut file).map_err(|e| {
                RepoError::network(
                    format!("Failed to download {}", remote_path.display()),
                    e.to_string(),
                )
            })?;
            files += 1;
        }
    }

    Ok(files)
}

fn ssh_error(error: ssh2::Error) -> RepoError {
    let message = error.message().to_string();
    match error.code() {
        ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED)
        | ErrorCode::Session(LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED) => {
            RepoError::auth("SSH authentication failed", message)
        }
        ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => RepoError::network("SSH session timed out", message),
        ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_FILE) | ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_PATH) => {
            RepoError::not_found(format!("SFTP path ({})", message))
        }
        ErrorCode::SFTP(LIBSSH2_FX_PERMISSION_DENIED) => {
            RepoError::auth("SFTP permission denied", message)
        }
        _ => RepoError::network("SSH transport error", message),
    }
}
