//! Pieces shared by the file-transfer drivers (ftp, sftp).
//!
//! Transfer backends have no history: they report one synthetic branch, and
//! `follow` mirrors the remote tree into a staging directory that replaces
//! the working copy only after the whole download succeeded.

use crate::common::error::RepoError;
use crate::common::result::{async_helpers::with_timeout, RepoResult};
use crate::domain::entities::Credentials;
use percent_encoding::percent_decode_str;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Where a transfer URL points, with credentials resolved.
#[derive(Debug, Clone)]
pub struct TransferEndpoint {
    pub host: String,
    pub port: u16,
    /// Percent-decoded remote directory; `None` means the login directory
    pub path: Option<String>,
    pub credentials: Credentials,
}

impl TransferEndpoint {
    /// Parse `url`, which must use `scheme`.
    ///
    /// Explicit credentials win over userinfo embedded in the URL.
    pub fn parse(
        url: &str,
        scheme: &str,
        default_port: u16,
        credentials: &Credentials,
    ) -> RepoResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| RepoError::config_with_source(format!("Invalid {} URL '{}'", scheme, url), e))?;

        if parsed.scheme() != scheme {
            return Err(RepoError::config(format!(
                "Expected a {}:// URL, got '{}://'",
                scheme,
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RepoError::config(format!("{} URL has no host", scheme)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let decoded = percent_decode_str(parsed.path()).decode_utf8_lossy();
        let path = Some(decoded.trim_end_matches('/').to_string()).filter(|p| !p.is_empty());

        Ok(Self {
            host,
            port: parsed.port().unwrap_or(default_port),
            path,
            credentials: credentials.merged_with_url(&parsed),
        })
    }

    /// First resolved address; resolution failures are network errors
    pub fn socket_addr(&self) -> RepoResult<SocketAddr> {
        let endpoint = format!("{}:{}", self.host, self.port);
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| RepoError::network(format!("Cannot resolve {}", endpoint), e.to_string()))?
            .next()
            .ok_or_else(|| RepoError::network(format!("No address for {}", endpoint), ""))
    }
}

/// Set when the async caller gave up; blocking loops poll it between files.
#[derive(Debug, Clone)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
    timeout_secs: u64,
}

impl CancelFlag {
    fn new(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            timeout_secs: timeout.as_secs(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// `TimedOut` once the caller is gone
    pub fn check(&self) -> RepoResult<()> {
        if self.is_cancelled() {
            return Err(RepoError::timed_out(self.timeout_secs));
        }
        Ok(())
    }
}

struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Run a blocking client session on the blocking pool, bounded by `timeout`.
///
/// The worker keeps running briefly after a timeout, until its socket
/// timeout fires or it next polls the cancel flag.
pub async fn run_blocking<T, F>(timeout: Duration, job: F) -> RepoResult<T>
where
    T: Send + 'static,
    F: FnOnce(CancelFlag) -> RepoResult<T> + Send + 'static,
{
    let flag = CancelFlag::new(timeout);
    let _cancel_on_drop = CancelOnDrop(flag.clone());

    let handle = tokio::task::spawn_blocking(move || job(flag));
    with_timeout(
        async move {
            handle
                .await
                .map_err(|e| RepoError::local_state_with_source("Transfer worker failed", PathBuf::new(), e))?
        },
        timeout,
    )
    .await
}

/// Join a remote directory and an entry name with `/`
pub fn remote_child(base: Option<&str>, name: &str) -> String {
    match base {
        Some(base) if base.ends_with('/') => format!("{}{}", base, name),
        Some(base) => format!("{}/{}", base, name),
        None => name.to_string(),
    }
}

/// Reject names that would escape the local directory
pub fn safe_entry_name(name: &str) -> Option<&str> {
    let name = name.rsplit('/').next().unwrap_or(name);
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Create one directory level; the parent must exist. A worker that outlives
/// its staging directory fails here instead of recreating it.
pub fn create_local_dir(path: &Path) -> RepoResult<()> {
    fs::create_dir(path)
        .map_err(|e| RepoError::local_state_with_source("Failed to create directory", path, e))
}

pub fn local_file(path: &Path) -> RepoResult<fs::File> {
    fs::File::create(path)
        .map_err(|e| RepoError::local_state_with_source("Failed to create file", path, e))
}
