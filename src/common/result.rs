use crate::common::error::RepoError;
use std::time::Duration;

/// Result alias used across the crate.
///
/// # Examples
///
/// ```
/// use repokit::common::result::RepoResult;
/// use repokit::common::error::RepoError;
///
/// fn resolve(branch: &str) -> RepoResult<String> {
///     if branch.is_empty() {
///         return Err(RepoError::not_found("empty branch name"));
///     }
///     Ok(branch.to_string())
/// }
///
/// assert!(resolve("main").is_ok());
/// assert!(resolve("").is_err());
/// ```
pub type RepoResult<T> = Result<T, RepoError>;

/// Helpers for callers consuming history queries.
pub trait RepoResultExt<T> {
    /// Treat a `NotFound` condition as an empty result.
    ///
    /// Useful for history UIs where "no such branch yet" is not exceptional.
    /// Every other error, `Parse` included, is passed through.
    ///
    /// # Examples
    ///
    /// ```
    /// use repokit::common::result::{RepoResult, RepoResultExt};
    /// use repokit::common::error::RepoError;
    ///
    /// let missing: RepoResult<Vec<String>> = Err(RepoError::not_found("branch 'next'"));
    /// assert_eq!(missing.or_empty_if_not_found().unwrap(), Vec::<String>::new());
    /// ```
    fn or_empty_if_not_found(self) -> RepoResult<T>
    where
        T: Default;
}

impl<T> RepoResultExt<T> for RepoResult<T> {
    fn or_empty_if_not_found(self) -> RepoResult<T>
    where
        T: Default,
    {
        match self {
            Err(RepoError::NotFound { what }) => {
                tracing::debug!("treating missing {} as empty result", what);
                Ok(T::default())
            }
            other => other,
        }
    }
}

/// Async helpers
pub mod async_helpers {
    use super::{Duration, RepoError, RepoResult};
    use std::future::Future;

    /// Run `f` bounded by `timeout`.
    ///
    /// The future is dropped when the deadline passes, so anything it owns
    /// (child processes spawned with `kill_on_drop`, lock guards, staging
    /// directories) is released before this returns.
    pub async fn with_timeout<F, T>(f: F, timeout: Duration) -> RepoResult<T>
    where
        F: Future<Output = RepoResult<T>>,
    {
        match tokio::time::timeout(timeout, f).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("operation exceeded {}s deadline", timeout.as_secs());
                Err(RepoError::timed_out(timeout.as_secs()))
            }
        }
    }
}
