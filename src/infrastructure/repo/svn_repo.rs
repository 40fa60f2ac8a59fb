use super::repo_interface::Repo;
use crate::application::services::RepoContext;
use crate::common::error::RepoError;
use crate::common::result::{async_helpers::with_timeout, RepoResult};
use crate::domain::entities::{CommitInfo, Credentials, ProjectId, ProjectRef};
use crate::domain::value_objects::RepoType;
use crate::infrastructure::process::{display_command, CommandExecutor, ExecutionConfig};
use async_trait::async_trait;
use chrono::DateTime;
use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

/// Parallel `svn log` calls when collecting tag history
const TAG_LOOKUP_CONCURRENCY: usize = 4;

const LOG_SEPARATOR: &str =
    "------------------------------------------------------------------------";

/// Subversion driver built on the `svn` command line client.
///
/// History reads take only a project id, so they reach the server with the
/// credentials svn cached during `follow`. `follow` asks svn to keep a
/// password even where only plaintext storage is available; an svn built
/// without plaintext storage and with no keyring caches nothing, and reads
/// of a password-protected repository then fail with `Auth`.
pub struct SvnRepo {
    context: RepoContext,
}

/// Parsed follow target
#[derive(Debug, Clone, PartialEq, Eq)]
enum SvnTarget {
    Head,
    Revision(u64),
    /// Repository-relative path such as `branches/release-2`
    Path(String),
}

impl SvnTarget {
    fn parse(target: &str) -> Self {
        let target = target.trim();
        if target.is_empty() || target.eq_ignore_ascii_case("HEAD") {
            return SvnTarget::Head;
        }

        let digits = target.strip_prefix('r').unwrap_or(target);
        match digits.parse::<u64>() {
            Ok(revision) if !digits.is_empty() => SvnTarget::Revision(revision),
            _ => SvnTarget::Path(target.trim_matches('/').to_string()),
        }
    }
}

impl SvnRepo {
    pub fn new(context: RepoContext) -> Self {
        Self { context }
    }

    fn executable(&self) -> &str {
        &self.context.config().svn.executable
    }

    /// Build authentication arguments if credentials are provided
    fn build_auth_args(&self, credentials: &Credentials) -> Vec<String> {
        let mut args = vec!["--non-interactive".to_string()];

        if let Some(user) = &credentials.username {
            args.push("--username".to_string());
            args.push(user.clone());
        }
        if let Some(pass) = &credentials.password {
            args.push("--password".to_string());
            args.push(pass.clone());
        }

        args
    }

    /// `build_auth_args` plus the option that lets svn cache the password
    /// for later history reads
    fn build_caching_auth_args(&self, credentials: &Credentials) -> Vec<String> {
        let mut args = self.build_auth_args(credentials);
        if credentials.password.is_some() {
            args.push("--config-option".to_string());
            args.push("servers:global:store-plaintext-passwords=yes".to_string());
        }
        args
    }

    /// Execute an SVN command and check for success
    async fn execute_svn_command_checked(
        &self,
        args: &[String],
        config: &ExecutionConfig,
    ) -> RepoResult<String> {
        let result = CommandExecutor::execute(self.executable(), args, config).await?;

        if !result.success {
            return Err(classify_svn_failure(
                display_command(self.executable(), args),
                result.exit_code,
                &result.stderr,
            ));
        }

        Ok(result.stdout)
    }

    fn line_name(&self, relative_url: &str) -> String {
        let line = relative_url
            .trim()
            .trim_start_matches("^/")
            .trim_matches('/');
        if line.is_empty() {
            self.context.config().svn.trunk.clone()
        } else {
            line.to_string()
        }
    }

    async fn current_line(&self, repo_path: &Path) -> RepoResult<String> {
        let args = strings(&["info", "--non-interactive", "--show-item", "relative-url"]);
        let config = ExecutionConfig::new().with_working_directory(repo_path);
        let output = self.execute_svn_command_checked(&args, &config).await?;
        Ok(self.line_name(&output))
    }

    async fn sync_working_copy(&self, project: &ProjectRef, target: &str) -> RepoResult<()> {
        let workspace = self.context.workspace();
        let repo_path = workspace.project_path(project.id);
        let (url, credentials) = split_credentials(&project.url, &project.credentials);
        let auth = self.build_caching_auth_args(&credentials);

        if !has_working_copy(&repo_path) {
            let staging = workspace.staging_dir(project.id)?;
            let staging_path = path_arg(staging.path())?;
            tracing::info!(project_id = project.id, "checking out fresh working copy");

            let mut args = strings(&["checkout", "--quiet"]);
            args.extend(auth.iter().cloned());
            args.push(url.clone());
            args.push(staging_path);
            self.execute_svn_command_checked(&args, &ExecutionConfig::new())
                .await?;
            workspace.install(project.id, staging)?;
        }

        let in_repo = ExecutionConfig::new().with_working_directory(&repo_path);

        self.execute_svn_command_checked(
            &strings(&["cleanup", "--non-interactive", "--remove-unversioned"]),
            &in_repo,
        )
        .await?;
        self.execute_svn_command_checked(
            &strings(&["revert", "--non-interactive", "--recursive", "--quiet", "."]),
            &in_repo,
        )
        .await?;

        // switch to the project URL doubles as update, and brings a copy
        // that was switched to another line back
        let mut args = strings(&["switch", "--quiet"]);
        args.extend(auth);
        match SvnTarget::parse(target) {
            SvnTarget::Head => args.push(url),
            SvnTarget::Revision(revision) => {
                args.push("--revision".to_string());
                args.push(revision.to_string());
                args.push(url);
            }
            SvnTarget::Path(path) => args.push(format!("^/{}", path)),
        }
        self.execute_svn_command_checked(&args, &in_repo).await?;

        Ok(())
    }

    /// `svn log` inside the working copy, parsed into entries for `branch`
    async fn read_log(
        &self,
        repo_path: &Path,
        target: &str,
        branch: &str,
        rows: usize,
        with_diff: bool,
    ) -> RepoResult<Vec<CommitInfo>> {
        if rows == 0 {
            return Ok(Vec::new());
        }

        let mut args = strings(&["log", "--non-interactive", "--limit"]);
        args.push(rows.to_string());
        if with_diff {
            args.push("--diff".to_string());
        }
        args.push(target.to_string());

        let config = ExecutionConfig::new().with_working_directory(repo_path);
        let output = self.execute_svn_command_checked(&args, &config).await?;

        let mut entries = parse_svn_log(&output)?;
        for entry in &mut entries {
            entry.branch = branch.to_string();
        }
        entries.truncate(rows);
        Ok(entries)
    }

    /// Project lock, working-copy check and network deadline around a read
    async fn with_working_copy<T, F, Fut>(&self, project_id: ProjectId, read: F) -> RepoResult<T>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: std::future::Future<Output = RepoResult<T>>,
    {
        let _guard = self.context.lock_project(project_id).await;
        let repo_path = self.context.workspace().require_project_dir(project_id)?;
        if !has_working_copy(&repo_path) {
            return Err(RepoError::local_state(
                "Working copy has not been checked out yet",
                repo_path,
            ));
        }

        with_timeout(read(repo_path), self.context.network_timeout()).await
    }

    async fn tags_newest_first(&self, repo_path: &Path, rows: usize) -> RepoResult<Vec<CommitInfo>> {
        let Some(tags_path) = self.context.config().svn.tags_path.clone() else {
            return Ok(Vec::new());
        };
        let tags_path = tags_path.trim_matches('/').to_string();

        let config = ExecutionConfig::new().with_working_directory(repo_path);
        let listing = self
            .execute_svn_command_checked(
                &strings(&["list", "--non-interactive", &format!("^/{}", tags_path)]),
                &config,
            )
            .await?;

        let tags: Vec<String> = listing
            .lines()
            .filter_map(|line| line.trim().strip_suffix('/'))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        let mut lookups = Vec::with_capacity(tags.len());
        for tag in tags {
            let location = format!("^/{}/{}", tags_path, tag);
            lookups.push(async move {
                let latest = self.read_log(repo_path, &location, "", 1, false).await?;
                Ok::<_, RepoError>(latest.into_iter().next().map(|mut entry| {
                    entry.tag = tag;
                    entry
                }))
            });
        }

        let found: Vec<Option<CommitInfo>> = stream::iter(lookups)
            .buffered(TAG_LOOKUP_CONCURRENCY)
            .try_collect()
            .await?;
        let mut tagged: Vec<CommitInfo> = found.into_iter().flatten().collect();

        tagged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.tag.cmp(&a.tag)));
        tagged.truncate(rows);
        Ok(tagged)
    }
}

#[async_trait]
impl Repo for SvnRepo {
    fn repo_type(&self) -> RepoType {
        RepoType::Svn
    }

    #[tracing::instrument(skip(self, url))]
    async fn ping(&self, url: &str) -> RepoResult<()> {
        RepoType::Svn.check_url(url)?;
        let (url, credentials) = split_credentials(url, &Credentials::default());
        let mut args = strings(&["info", "--depth", "empty"]);
        args.extend(self.build_auth_args(&credentials));
        args.push(url);

        let config = ExecutionConfig::new().with_timeout(self.context.network_timeout());
        self.execute_svn_command_checked(&args, &config).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn create(&self, project_id: ProjectId) -> RepoResult<()> {
        let _guard = self.context.lock_project(project_id).await;
        self.context.workspace().create_project_dir(project_id)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, project), fields(project_id = project.id))]
    async fn follow(&self, project: &ProjectRef, target: &str) -> RepoResult<()> {
        RepoType::Svn.check_url(&project.url)?;
        let _guard = self.context.lock_project(project.id).await;
        tracing::info!(follow_target = %target, "following svn repository");

        with_timeout(
            self.sync_working_copy(project, target),
            self.context.network_timeout(),
        )
        .await?;

        tracing::info!(follow_target = %target, "svn working copy is up to date");
        Ok(())
    }

    #[tracing::instrument(skip(self, url))]
    async fn remote_branch_list(&self, url: &str) -> RepoResult<Vec<String>> {
        RepoType::Svn.check_url(url)?;
        let (url, credentials) = split_credentials(url, &Credentials::default());
        let mut args = strings(&["info", "--show-item", "relative-url"]);
        args.extend(self.build_auth_args(&credentials));
        args.push(url);

        let config = ExecutionConfig::new().with_timeout(self.context.network_timeout());
        let output = self.execute_svn_command_checked(&args, &config).await?;
        Ok(vec![self.line_name(&output)])
    }

    #[tracing::instrument(skip(self))]
    async fn branch_list(&self, project_id: ProjectId) -> RepoResult<Vec<String>> {
        self.with_working_copy(project_id, |repo_path| async move {
            Ok(vec![self.current_line(&repo_path).await?])
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn commit_log(&self, project_id: ProjectId, rows: usize) -> RepoResult<Vec<CommitInfo>> {
        self.with_working_copy(project_id, |repo_path| async move {
            let line = self.current_line(&repo_path).await?;
            self.read_log(&repo_path, ".", &line, rows, true).await
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn branch_log(
        &self,
        project_id: ProjectId,
        branch: &str,
        rows: usize,
    ) -> RepoResult<Vec<CommitInfo>> {
        self.with_working_copy(project_id, |repo_path| async move {
            let line = self.current_line(&repo_path).await?;
            let wanted = branch.trim().trim_matches('/');
            if wanted == line {
                return self.read_log(&repo_path, ".", &line, rows, true).await;
            }
            self.read_log(&repo_path, &format!("^/{}", wanted), wanted, rows, true)
                .await
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn tag_log(&self, project_id: ProjectId, rows: usize) -> RepoResult<Vec<CommitInfo>> {
        self.with_working_copy(project_id, |repo_path| async move {
            self.tags_newest_first(&repo_path, rows).await
        })
        .await
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn path_arg(path: &Path) -> RepoResult<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| RepoError::local_state("Path is not valid UTF-8", path))
}

fn has_working_copy(path: &Path) -> bool {
    RepoType::Svn
        .metadata_dir()
        .map(|dir| path.join(dir).is_dir())
        .unwrap_or(false)
}

/// Move userinfo out of the URL; svn takes credentials as flags.
fn split_credentials(url: &str, credentials: &Credentials) -> (String, Credentials) {
    match Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let merged = credentials.merged_with_url(&parsed);
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            (parsed.to_string(), merged)
        }
        _ => (url.to_string(), credentials.clone()),
    }
}

/// Map svn's `E<code>` diagnostics onto the error taxonomy.
fn classify_svn_failure(command: String, exit_code: i32, stderr: &str) -> RepoError {
    const AUTH: &[&str] = &["E170001", "E215004", "E230001"];
    const NOT_FOUND: &[&str] = &["E160013", "E200009", "E170000", "E160006", "E195012"];
    const NETWORK: &[&str] = &[
        "E170013", "E670008", "E731001", "E000111", "E000110", "E000113", "E120108", "E175012",
    ];

    let headline = stderr
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("svn: E"))
        .or_else(|| stderr.lines().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or("svn command failed")
        .to_string();
    let has_code = |codes: &[&str]| codes.iter().any(|code| stderr.contains(code));

    if has_code(AUTH) {
        RepoError::auth(headline, stderr.trim())
    } else if has_code(NOT_FOUND) || stderr.to_lowercase().contains("path not found") {
        RepoError::not_found(headline)
    } else if has_code(NETWORK) {
        RepoError::network(headline, stderr.trim())
    } else {
        RepoError::command_failed(command, exit_code, stderr.trim())
    }
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(
            r"^r(\d+) \| (.*?) \| (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} [+-]\d{4}) \(.*\) \| (\d+) lines?$",
        )
        .expect("valid regex")
    })
}

/// Parse `svn log [--diff]` output, newest first as svn prints it.
///
/// Entries are framed by separator lines; a separator only counts as a frame
/// when the next line is a revision header (or the output ends), so diffs
/// containing a dashed line do not split an entry.
fn parse_svn_log(output: &str) -> RepoResult<Vec<CommitInfo>> {
    let lines: Vec<&str> = output.lines().collect();
    let Some(first) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    if lines[first] != LOG_SEPARATOR {
        return Err(RepoError::parse(
            "svn",
            format!("log does not start with a separator: {}", lines[first]),
        ));
    }

    let header = header_regex();
    let is_frame = |i: usize| {
        lines[i] == LOG_SEPARATOR && (i + 1 == lines.len() || header.is_match(lines[i + 1]))
    };

    let mut entries = Vec::new();
    let mut i = first;
    while i + 1 < lines.len() {
        let header_line = lines[i + 1];
        let captures = header.captures(header_line).ok_or_else(|| {
            RepoError::parse("svn", format!("unexpected log header: {}", header_line))
        })?;

        let revision = &captures[1];
        let author = captures[2].to_string();
        let timestamp = DateTime::parse_from_str(&captures[3], "%Y-%m-%d %H:%M:%S %z")
            .map_err(|e| RepoError::parse("svn", format!("bad date '{}': {}", &captures[3], e)))?
            .timestamp();
        let message_lines: usize = captures[4]
            .parse()
            .map_err(|_| RepoError::parse("svn", format!("bad line count in: {}", header_line)))?;

        // header, blank line, then the message
        let message_start = i + 3;
        let message_end = message_start + message_lines;
        if message_end > lines.len() {
            return Err(RepoError::parse(
                "svn",
                format!("log message of r{} is truncated", revision),
            ));
        }
        let message = lines[message_start..message_end].join("\n");

        let mut next = message_end;
        while next < lines.len() && !is_frame(next) {
            next += 1;
        }
        let diff = lines[message_end..next]
            .iter()
            .skip_while(|line| line.trim().is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n");

        entries.push(CommitInfo {
            branch: String::new(),
            commit: revision.to_string(),
            author,
            timestamp,
            message: message.trim_end().to_string(),
            tag: String::new(),
            diff: if diff.trim().is_empty() {
                String::new()
            } else {
                format!("{}\n", diff.trim_end())
            },
        });

        if next >= lines.len() {
            return Err(RepoError::parse("svn", "log ended without a closing separator"));
        }
        i = next;
    }

    Ok(entries)
}
