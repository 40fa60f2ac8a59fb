//! Test fixtures for creating upstream repositories
//!
//! `UpstreamRepo` is a bare git repository in a temporary directory that
//! tests clone through a `file://` URL. Commits, branches and tags are
//! written directly with libgit2 so every timestamp is controlled.

use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Base commit time used by fixtures (2023-11-14T22:13:20Z)
pub const BASE_TIME: i64 = 1_700_000_000;

/// A bare upstream repository
pub struct UpstreamRepo {
    dir: TempDir,
    repo: Repository,
}

impl UpstreamRepo {
    /// Empty bare repository whose HEAD points at `main`
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create upstream directory");
        let mut options = RepositoryInitOptions::new();
        options.bare(true).initial_head("main");
        let repo = Repository::init_opts(dir.path(), &options).expect("Failed to init upstream");
        Self { dir, repo }
    }

    /// Upstream with three commits on `main` and one on `feature`:
    ///
    /// ```text
    /// main:    c1 -- c2 -- c3
    ///                  \
    /// feature:          f1
    /// ```
    ///
    /// `v1.0` is an annotated tag on c2, `v1.1` a lightweight tag on c3.
    pub fn with_history() -> Self {
        let upstream = Self::new();
        upstream.commit("main", "README.md", "# shop\n", "Initial commit", BASE_TIME);
        let c2 = upstream.commit("main", "app.txt", "v1\n", "Add app", BASE_TIME + 60);
        let c3 = upstream.commit("main", "app.txt", "v2\n", "Update app", BASE_TIME + 120);
        upstream.branch("feature", c2);
        upstream.commit("feature", "feature.txt", "wip\n", "Start feature", BASE_TIME + 180);
        upstream.tag_annotated("v1.0", c2, BASE_TIME + 90);
        upstream.tag_lightweight("v1.1", c3);
        upstream
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.dir.path().display())
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn signature(when: i64) -> Signature<'static> {
        Signature::new("Alice", "alice@example.com", &Time::new(when, 0))
            .expect("Failed to build signature")
    }

    /// Commit `file` with `content` on top of `branch`, creating the branch if needed
    pub fn commit(&self, branch: &str, file: &str, content: &str, message: &str, when: i64) -> Oid {
        let reference = format!("refs/heads/{}", branch);
        let parent = self
            .repo
            .find_reference(&reference)
            .ok()
            .and_then(|r| r.peel_to_commit().ok());

        let base_tree = parent.as_ref().map(|c| c.tree().expect("parent tree"));
        let mut builder = self
            .repo
            .treebuilder(base_tree.as_ref())
            .expect("Failed to create tree builder");
        let blob = self.repo.blob(content.as_bytes()).expect("Failed to write blob");
        builder.insert(file, blob, 0o100644).expect("Failed to insert blob");
        let tree = self
            .repo
            .find_tree(builder.write().expect("Failed to write tree"))
            .expect("Failed to find tree");

        let signature = Self::signature(when);
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(Some(&reference), &signature, &signature, message, &tree, &parents)
            .expect("Failed to commit")
    }

    pub fn branch(&self, name: &str, at: Oid) {
        let commit = self.repo.find_commit(at).expect("Failed to find commit");
        self.repo.branch(name, &commit, true).expect("Failed to create branch");
    }

    pub fn tag_annotated(&self, name: &str, at: Oid, when: i64) {
        let object = self.repo.find_object(at, None).expect("Failed to find object");
        self.repo
            .tag(name, &object, &Self::signature(when), &format!("Release {}", name), false)
            .expect("Failed to create annotated tag");
    }

    pub fn tag_lightweight(&self, name: &str, at: Oid) {
        let object = self.repo.find_object(at, None).expect("Failed to find object");
        self.repo
            .tag_lightweight(name, &object, false)
            .expect("Failed to create lightweight tag");
    }

    /// Tip of `branch`
    pub fn head_of(&self, branch: &str) -> Oid {
        self.repo
            .find_reference(&format!("refs/heads/{}", branch))
            .and_then(|r| r.peel_to_commit())
            .map(|c| c.id())
            .expect("Failed to resolve branch")
    }
}

/// Whether `svn` and `svnadmin` are on PATH
pub fn svn_available() -> bool {
    ["svn", "svnadmin"].iter().all(|tool| {
        Command::new(tool)
            .arg("--version")
            .arg("--quiet")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    })
}

/// A Subversion repository served over `file://`, with a scratch working
/// copy of trunk used to commit.
pub struct SvnUpstream {
    dir: TempDir,
}

impl SvnUpstream {
    /// Standard layout with this history:
    ///
    /// ```text
    /// r1  Create layout    trunk/, tags/
    /// r2  Add app          trunk/app.txt = v1
    /// r3  Tag v1.0         tags/v1.0 from trunk@2
    /// r4  Update app       trunk/app.txt = v2
    /// r5  Tag v1.1         tags/v1.1 from trunk@4
    /// ```
    pub fn with_history() -> Self {
        let dir = TempDir::new().expect("Failed to create svn upstream directory");
        let upstream = Self { dir };
        run(Command::new("svnadmin").arg("create").arg(upstream.repo_path()));

        let root = upstream.root_url();
        upstream.svn(&[
            "mkdir",
            "-m",
            "Create layout",
            &format!("{}/trunk", root),
            &format!("{}/tags", root),
        ]);
        upstream.svn(&["checkout", "--quiet", &format!("{}/trunk", root), &upstream.scratch()]);

        upstream.commit("app.txt", "v1\n", "Add app");
        upstream.tag("v1.0", 2);
        upstream.commit("app.txt", "v2\n", "Update app");
        upstream.tag("v1.1", 4);
        upstream
    }

    fn repo_path(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    fn scratch(&self) -> String {
        self.dir.path().join("scratch").display().to_string()
    }

    pub fn root_url(&self) -> String {
        format!("file://{}", self.repo_path().display())
    }

    pub fn trunk_url(&self) -> String {
        format!("{}/trunk", self.root_url())
    }

    fn svn(&self, args: &[&str]) {
        run(Command::new("svn")
            .args(["--non-interactive", "--username", "alice"])
            .args(args));
    }

    /// Write `file` in trunk and commit it, adding it if new
    pub fn commit(&self, file: &str, content: &str, message: &str) {
        let path = Path::new(&self.scratch()).join(file);
        let is_new = !path.exists();
        fs::write(&path, content).expect("Failed to write svn file");
        let path = path.display().to_string();
        if is_new {
            self.svn(&["add", "--quiet", &path]);
        }
        self.svn(&["commit", "--quiet", "-m", message, &self.scratch()]);
    }

    pub fn tag(&self, name: &str, revision: u64) {
        self.svn(&[
            "copy",
            "-m",
            &format!("Tag {}", name),
            &format!("{}@{}", self.trunk_url(), revision),
            &format!("{}/tags/{}", self.root_url(), name),
        ]);
    }
}

fn run(command: &mut Command) {
    let output = command.output().expect("Failed to run svn tooling");
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        command,
        String::from_utf8_lossy(&output.stderr)
    );
}
