use super::repo_interface::Repo;
use crate::application::services::RepoContext;
use crate::common::error::RepoError;
use crate::common::result::{async_helpers::with_timeout, RepoResult};
use crate::domain::entities::{CommitInfo, Credentials, ProjectId, ProjectRef};
use crate::domain::value_objects::RepoType;
use crate::infrastructure::process::{display_command, CommandExecutor, ExecutionConfig};
use async_trait::async_trait;
use git2::{BranchType, Commit, DiffFormat, ErrorCode, Oid, Repository, Sort};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use url::Url;
use walkdir::WalkDir;

/// Git driver.
///
/// Network-facing work (clone, fetch, ls-remote) goes through the `git`
/// executable so transport, credential helpers and ssh behave exactly as on
/// the command line. History reads open the local clone with libgit2.
pub struct GitRepo {
    context: RepoContext,
}

/// What a follow target resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
enum ResolvedTarget {
    Branch(String),
    Detached(String),
}

impl GitRepo {
    pub fn new(context: RepoContext) -> Self {
        Self { context }
    }

    fn executable(&self) -> &str {
        &self.context.config().git.executable
    }

    /// Execute a git command and return its stdout, classifying failures
    async fn execute_git_command_checked(
        &self,
        args: &[String],
        config: &ExecutionConfig,
    ) -> RepoResult<String> {
        let result = CommandExecutor::execute(self.executable(), args, config).await?;

        if !result.success {
            return Err(classify_git_failure(
                display_command(self.executable(), args),
                result.exit_code,
                &result.stderr,
            ));
        }

        Ok(result.stdout)
    }

    /// `git rev-parse --verify` a spec inside the working copy
    async fn rev_parse(&self, repo_path: &Path, spec: &str) -> RepoResult<Option<String>> {
        let args = strings(&["rev-parse", "--verify", "--quiet", spec]);
        let config = ExecutionConfig::new().with_working_directory(repo_path);
        let result = CommandExecutor::execute(self.executable(), &args, &config).await?;

        Ok(result
            .success
            .then(|| result.stdout.trim().to_string())
            .filter(|sha| !sha.is_empty()))
    }

    /// Resolve a follow target: branch, then tag, then commit.
    async fn resolve_target(&self, repo_path: &Path, target: &str) -> RepoResult<ResolvedTarget> {
        let target = target.trim();

        if target.is_empty() {
            let config = ExecutionConfig::new().with_working_directory(repo_path);
            let args = strings(&["symbolic-ref", "--quiet", "refs/remotes/origin/HEAD"]);
            let result = CommandExecutor::execute(self.executable(), &args, &config).await?;
            return result
                .stdout
                .trim()
                .strip_prefix("refs/remotes/origin/")
                .filter(|_| result.success)
                .map(|branch| ResolvedTarget::Branch(branch.to_string()))
                .ok_or_else(|| RepoError::not_found("default branch of remote 'origin'"));
        }

        let remote_branch = format!("refs/remotes/origin/{}^{{commit}}", target);
        if self.rev_parse(repo_path, &remote_branch).await?.is_some() {
            return Ok(ResolvedTarget::Branch(target.to_string()));
        }

        let tag = format!("refs/tags/{}^{{commit}}", target);
        if let Some(sha) = self.rev_parse(repo_path, &tag).await? {
            return Ok(ResolvedTarget::Detached(sha));
        }

        if looks_like_commit(target) {
            let commit = format!("{}^{{commit}}", target);
            if let Some(sha) = self.rev_parse(repo_path, &commit).await? {
                return Ok(ResolvedTarget::Detached(sha));
            }
        }

        Err(RepoError::not_found(format!(
            "branch, tag or commit '{}'",
            target
        )))
    }

    /// Clone if absent, fetch, then check out `target` and discard local drift.
    ///
    /// A fresh clone is converged in staging and installed only once complete.
    /// An existing clone that git can no longer drive is rebuilt the same way.
    async fn sync_working_copy(&self, project: &ProjectRef, target: &str) -> RepoResult<()> {
        let workspace = self.context.workspace();
        let repo_path = workspace.project_path(project.id);

        if !repo_path.join(".git").exists() {
            return self.rebuild_working_copy(project, target).await;
        }

        clear_stale_locks(&repo_path.join(".git"))?;
        match self.converge(&repo_path, project, target).await {
            Err(e @ (RepoError::CommandFailed { .. } | RepoError::LocalState { .. })) => {
                tracing::warn!(project_id = project.id, "existing clone is unusable, re-cloning: {}", e);
                self.rebuild_working_copy(project, target).await
            }
            result => result,
        }
    }

    async fn rebuild_working_copy(&self, project: &ProjectRef, target: &str) -> RepoResult<()> {
        let workspace = self.context.workspace();
        let staging = workspace.staging_dir(project.id)?;
        let staging_path = path_arg(staging.path())?;
        let fetch_url = authenticated_url(&project.url, &project.credentials)?;
        tracing::info!(project_id = project.id, "cloning into fresh working copy");

        self.execute_git_command_checked(
            &strings(&["clone", "--quiet", &fetch_url, &staging_path]),
            &auth_environment(&project.credentials),
        )
        .await?;
        self.converge(staging.path(), project, target).await?;

        workspace.install(project.id, staging)
    }

    /// Fetch into the clone at `repo_path` and make its tree match `target`.
    async fn converge(&self, repo_path: &Path, project: &ProjectRef, target: &str) -> RepoResult<()> {
        let fetch_url = authenticated_url(&project.url, &project.credentials)?;
        let in_repo = auth_environment(&project.credentials).with_working_directory(repo_path);

        // keep credentials out of .git/config; they are passed per fetch
        self.execute_git_command_checked(
            &strings(&["remote", "set-url", "origin", &project.url]),
            &in_repo,
        )
        .await?;

        self.execute_git_command_checked(
            &strings(&[
                "fetch",
                "--quiet",
                "--prune",
                "--force",
                "--tags",
                &fetch_url,
                "+refs/heads/*:refs/remotes/origin/*",
            ]),
            &in_repo,
        )
        .await?;

        match self.resolve_target(repo_path, target).await? {
            ResolvedTarget::Branch(branch) => {
                let start = format!("refs/remotes/origin/{}", branch);
                self.execute_git_command_checked(
                    &strings(&["checkout", "--quiet", "--force", "-B", &branch, &start]),
                    &in_repo,
                )
                .await?;
            }
            ResolvedTarget::Detached(sha) => {
                self.execute_git_command_checked(
                    &strings(&["checkout", "--quiet", "--force", "--detach", &sha]),
                    &in_repo,
                )
                .await?;
            }
        }

        self.execute_git_command_checked(&strings(&["reset", "--quiet", "--hard", "HEAD"]), &in_repo)
            .await?;
        self.execute_git_command_checked(&strings(&["clean", "-ffdq"]), &in_repo)
            .await?;

        Ok(())
    }

    /// Run a libgit2 read against the project's clone under the project lock.
    async fn read_local<T, F>(&self, project_id: ProjectId, read: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Repository, &Path) -> RepoResult<T> + Send + 'static,
    {
        let _guard = self.context.lock_project(project_id).await;
        let repo_path = self.context.workspace().require_project_dir(project_id)?;

        let join_path = repo_path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = open_clone(&repo_path)?;
            read(&repo, &repo_path)
        })
        .await
        .map_err(|e| RepoError::local_state_with_source("History reader failed", join_path, e))?
    }
}

#[async_trait]
impl Repo for GitRepo {
    fn repo_type(&self) -> RepoType {
        RepoType::Git
    }

    #[tracing::instrument(skip(self, url))]
    async fn ping(&self, url: &str) -> RepoResult<()> {
        RepoType::Git.check_url(url)?;
        let config = auth_environment(&Credentials::default())
            .with_timeout(self.context.network_timeout());
        self.execute_git_command_checked(&strings(&["ls-remote", url, "HEAD"]), &config)
            .await?;
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
        RepoType::Git.check_url(&project.url)?;
        let _guard = self.context.lock_project(project.id).await;
        tracing::info!(follow_target = %target, "following git repository");

        with_timeout(
            self.sync_working_copy(project, target),
            self.context.network_timeout(),
        )
        .await?;

        tracing::info!(follow_target = %target, "git working copy is up to date");
        Ok(())
    }

    #[tracing::instrument(skip(self, url))]
    async fn remote_branch_list(&self, url: &str) -> RepoResult<Vec<String>> {
        RepoType::Git.check_url(url)?;
        let config = auth_environment(&Credentials::default())
            .with_timeout(self.context.network_timeout());
        let output = self
            .execute_git_command_checked(&strings(&["ls-remote", "--heads", url]), &config)
            .await?;
        parse_ls_remote_heads(&output)
    }

    #[tracing::instrument(skip(self))]
    async fn branch_list(&self, project_id: ProjectId) -> RepoResult<Vec<String>> {
        self.read_local(project_id, |repo, path| list_branches(repo, path))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn commit_log(&self, project_id: ProjectId, rows: usize) -> RepoResult<Vec<CommitInfo>> {
        self.read_local(project_id, move |repo, path| {
            let head = match repo.head() {
                Ok(head) => head,
                Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(Vec::new()),
                Err(e) => return Err(local_error(path, e)),
            };
            let branch = if head.is_branch() {
                head.shorthand().unwrap_or_default().to_string()
            } else {
                String::new()
            };
            let start = head.peel_to_commit().map_err(|e| local_error(path, e))?.id();
            walk_history(repo, path, start, &branch, rows)
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
        let branch = branch.to_string();
        self.read_local(project_id, move |repo, path| {
            // remote-tracking refs are pruned on fetch; stale local heads are not
            let start = repo
                .find_reference(&format!("refs/remotes/origin/{}", branch))
                .and_then(|r| r.peel_to_commit())
                .map(|c| c.id())
                .map_err(|_| RepoError::not_found(format!("branch '{}'", branch)))?;

            walk_history(repo, path, start, &branch, rows)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn tag_log(&self, project_id: ProjectId, rows: usize) -> RepoResult<Vec<CommitInfo>> {
        self.read_local(project_id, move |repo, path| list_tags(repo, path, rows))
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

fn looks_like_commit(target: &str) -> bool {
    static HEX: OnceLock<Regex> = OnceLock::new();
    HEX.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{4,64}$").expect("valid regex"))
        .is_match(target)
}

/// Put explicit credentials into an http(s) URL that carries none.
fn authenticated_url(url: &str, credentials: &Credentials) -> RepoResult<String> {
    let (Some(username), Some(password)) = (&credentials.username, &credentials.password) else {
        return Ok(url.to_string());
    };

    let mut parsed = match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
        _ => return Ok(url.to_string()),
    };
    if !parsed.username().is_empty() {
        return Ok(url.to_string());
    }

    parsed
        .set_username(username)
        .and_then(|_| parsed.set_password(Some(password)))
        .map_err(|_| RepoError::config(format!("Cannot attach credentials to URL '{}'", url)))?;
    Ok(parsed.to_string())
}

/// Environment that keeps git from ever waiting on a prompt
fn auth_environment(credentials: &Credentials) -> ExecutionConfig {
    let ssh_command = match &credentials.private_key {
        Some(key) => format!(
            "ssh -i '{}' -o IdentitiesOnly=yes -o BatchMode=yes -o StrictHostKeyChecking=accept-new",
            key.display()
        ),
        None => "ssh -o BatchMode=yes -o StrictHostKeyChecking=accept-new".to_string(),
    };

    ExecutionConfig::new()
        .with_environment_variable("GIT_TERMINAL_PROMPT", "0")
        .with_environment_variable("GIT_SSH_COMMAND", ssh_command)
}

/// Map git's stderr onto the error taxonomy.
fn classify_git_failure(command: String, exit_code: i32, stderr: &str) -> RepoError {
    const AUTH: &[&str] = &[
        "authentication failed",
        "could not read username",
        "could not read password",
        "terminal prompts disabled",
        "permission denied (publickey",
        "invalid username or password",
        "http basic: access denied",
        "the requested url returned error: 401",
        "the requested url returned error: 403",
    ];
    const NOT_FOUND: &[&str] = &[
        "repository not found",
        "' not found",
        "does not appear to be a git repository",
        "couldn't find remote ref",
        "unknown revision",
        "did not match any file(s) known to git",
        "the requested url returned error: 404",
    ];
    const NETWORK: &[&str] = &[
        "could not resolve host",
        "could not resolve hostname",
        "connection refused",
        "connection timed out",
        "operation timed out",
        "network is unreachable",
        "no route to host",
        "connection reset",
        "failed to connect",
        "unable to access",
        "could not read from remote repository",
        "the remote end hung up",
        "early eof",
    ];

    let lower = stderr.to_lowercase();
    let headline = stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("git command failed")
        .to_string();

    if AUTH.iter().any(|p| lower.contains(p)) {
        RepoError::auth(headline, stderr.trim())
    } else if NOT_FOUND.iter().any(|p| lower.contains(p)) {
        RepoError::not_found(headline)
    } else if NETWORK.iter().any(|p| lower.contains(p)) {
        RepoError::network(headline, stderr.trim())
    } else {
        RepoError::command_failed(command, exit_code, stderr.trim())
    }
}

/// Branch names from `git ls-remote --heads` output
fn parse_ls_remote_heads(output: &str) -> RepoResult<Vec<String>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split_once('\t')
                .and_then(|(_, reference)| reference.trim().strip_prefix("refs/heads/"))
                .map(str::to_string)
                .ok_or_else(|| RepoError::parse("git", format!("unexpected ls-remote line: {}", line)))
        })
        .collect()
}

fn open_clone(path: &Path) -> RepoResult<Repository> {
    if !path.join(".git").exists() {
        return Err(RepoError::local_state(
            "Working copy has not been cloned yet",
            path,
        ));
    }
    Repository::open(path)
        .map_err(|e| RepoError::local_state_with_source("Failed to open git working copy", path, e))
}

/// Remove `*.lock` files a killed git process left behind.
///
/// Only called under the project lock, when no git process of ours can be
/// running in this clone.
fn clear_stale_locks(git_dir: &Path) -> RepoResult<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(git_dir)
        .into_iter()
        .filter_entry(|e| e.file_name() != "objects")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "lock"))
    {
        fs::remove_file(entry.path()).map_err(|e| {
            RepoError::local_state_with_source("Failed to remove stale git lock", entry.path(), e)
        })?;
        tracing::warn!(path = %entry.path().display(), "removed stale git lock");
        removed += 1;
    }
    Ok(removed)
}

fn local_error(path: &Path, error: git2::Error) -> RepoError {
    if error.code() == ErrorCode::NotFound {
        RepoError::not_found(error.message().to_string())
    } else {
        RepoError::local_state_with_source("Failed to read git history", PathBuf::from(path), error)
    }
}

/// Branches published at `origin` as of the last fetch, most recently
/// committed first. Local branches left over from earlier follows are not
/// reported.
fn list_branches(repo: &Repository, path: &Path) -> RepoResult<Vec<String>> {
    let mut branches: Vec<(String, i64)> = Vec::new();

    for entry in repo.branches(Some(BranchType::Remote)).map_err(|e| local_error(path, e))? {
        let (branch, _) = entry.map_err(|e| local_error(path, e))?;
        let Some(name) = branch.name().map_err(|e| local_error(path, e))? else {
            continue;
        };
        let Some(name) = name.strip_prefix("origin/") else {
            continue;
        };
        if name == "HEAD" {
            continue;
        }

        let time = branch
            .get()
            .peel_to_commit()
            .map(|c| c.time().seconds())
            .unwrap_or(0);
        branches.push((name.to_string(), time));
    }

    branches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(branches.into_iter().map(|(name, _)| name).collect())
}

/// Tag names keyed by the commit they point at
fn tags_by_commit(repo: &Repository, path: &Path) -> RepoResult<HashMap<Oid, Vec<String>>> {
    let mut index: HashMap<Oid, Vec<String>> = HashMap::new();
    let names = repo.tag_names(None).map_err(|e| local_error(path, e))?;

    for name in names.iter().flatten() {
        let Ok(object) = repo.revparse_single(&format!("refs/tags/{}", name)) else {
            continue;
        };
        if let Ok(commit) = object.peel_to_commit() {
            index.entry(commit.id()).or_default().push(name.to_string());
        }
    }

    for names in index.values_mut() {
        names.sort();
    }
    Ok(index)
}

/// Reverse-chronological topological walk from `start`, parents after children.
fn walk_history(
    repo: &Repository,
    path: &Path,
    start: Oid,
    branch: &str,
    rows: usize,
) -> RepoResult<Vec<CommitInfo>> {
    if rows == 0 {
        return Ok(Vec::new());
    }

    let tags = tags_by_commit(repo, path)?;
    let mut revwalk = repo.revwalk().map_err(|e| local_error(path, e))?;
    revwalk.push(start).map_err(|e| local_error(path, e))?;
    revwalk
        .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
        .map_err(|e| local_error(path, e))?;

    let mut history = Vec::with_capacity(rows.min(256));
    for oid in revwalk.take(rows) {
        let oid = oid.map_err(|e| local_error(path, e))?;
        let commit = repo.find_commit(oid).map_err(|e| local_error(path, e))?;
        let tag = tags.get(&oid).map(|names| names.join(",")).unwrap_or_default();
        history.push(to_commit_info(repo, path, &commit, branch, tag)?);
    }

    Ok(history)
}

/// One entry per tag, newest tag first.
///
/// Annotated tags are ordered by tagger date, lightweight tags by the date of
/// the commit they point at.
fn list_tags(repo: &Repository, path: &Path, rows: usize) -> RepoResult<Vec<CommitInfo>> {
    let names = repo.tag_names(None).map_err(|e| local_error(path, e))?;
    let mut tagged: Vec<(i64, String, Oid)> = Vec::new();

    for name in names.iter().flatten() {
        let object = repo
            .revparse_single(&format!("refs/tags/{}", name))
            .map_err(|e| local_error(path, e))?;
        let Ok(commit) = object.peel_to_commit() else {
            // tags on trees or blobs have no history to show
            continue;
        };
        let created = object
            .as_tag()
            .and_then(|tag| tag.tagger().map(|tagger| tagger.when().seconds()))
            .unwrap_or_else(|| commit.time().seconds());
        tagged.push((created, name.to_string(), commit.id()));
    }

    tagged.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

    tagged
        .into_iter()
        .take(rows)
        .map(|(_, name, oid)| {
            let commit = repo.find_commit(oid).map_err(|e| local_error(path, e))?;
            to_commit_info(repo, path, &commit, "", name)
        })
        .collect()
}

fn to_commit_info(
    repo: &Repository,
    path: &Path,
    commit: &Commit<'_>,
    branch: &str,
    tag: String,
) -> RepoResult<CommitInfo> {
    let author = commit.author();
    Ok(CommitInfo {
        branch: branch.to_string(),
        commit: commit.id().to_string(),
        author: String::from_utf8_lossy(author.name_bytes()).into_owned(),
        timestamp: commit.time().seconds(),
        message: String::from_utf8_lossy(commit.message_bytes())
            .trim_end()
            .to_string(),
        tag,
        diff: first_parent_diff(repo, path, commit)?,
    })
}

/// Unified diff of `commit` against its first parent (the empty tree for a root commit)
fn first_parent_diff(repo: &Repository, path: &Path, commit: &Commit<'_>) -> RepoResult<String> {
    let new_tree = commit.tree().map_err(|e| local_error(path, e))?;
    let old_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree().map_err(|e| local_error(path, e))?),
        Err(_) => None,
    };

    let diff = repo
        .diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)
        .map_err(|e| local_error(path, e))?;

    let mut patch = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            patch.push(line.origin());
        }
        patch.push_str(&String::from_utf8_lossy(line.content()));
        true
    })
    .map_err(|e| local_error(path, e))?;

    Ok(patch)
}
