//! Local working copies used to stage remediation commits.

use crate::error::{ConformError, Result};
use crate::types::{BranchRef, RepoId};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Shallow local checkouts keyed by target repository.
pub trait Checkout {
    /// Clone `branch` (shallow, single branch) into the slot for `key` and
    /// return its path. An existing slot is reused as-is.
    fn clone_branch(&self, branch: &BranchRef, key: &RepoId) -> Result<PathBuf>;

    /// Stage everything under `path`, commit with `message`, and push to `branch`.
    fn commit_and_push(&self, path: &Path, branch: &BranchRef, message: &str) -> Result<()>;

    /// Delete the working copy. Missing paths are not an error.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Whether `repo` can be listed anonymously.
    fn probe_read(&self, repo: &RepoId) -> bool;
}

/// Checkout backed by the `gh` and `git` command line tools.
pub struct GitCheckout {
    clone_root: PathBuf,
    gh_binary: String,
    git_binary: String,
    web_url: String,
}

impl GitCheckout {
    pub fn new(
        clone_root: impl Into<PathBuf>,
        gh_binary: impl Into<String>,
        git_binary: impl Into<String>,
        web_url: impl Into<String>,
    ) -> Self {
        Self {
            clone_root: clone_root.into(),
            gh_binary: gh_binary.into(),
            git_binary: git_binary.into(),
            web_url: web_url.into(),
        }
    }

    /// Slot for a target: `<clone_root>/<owner>/<name>`.
    pub fn checkout_path(&self, key: &RepoId) -> PathBuf {
        self.clone_root.join(&key.owner).join(&key.name)
    }

    fn run(&self, mut cmd: Command, operation: &str) -> Result<String> {
        debug!(operation, "Running command");
        let output = cmd.output().map_err(|e| {
            ConformError::collaborator(operation, format!("failed to spawn: {}", e))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let message = if stderr.is_empty() { stdout } else { stderr };
            return Err(ConformError::collaborator(operation, message));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn git(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.git_binary);
        cmd.arg("-C").arg(path);
        cmd
    }
}

impl Checkout for GitCheckout {
    fn clone_branch(&self, branch: &BranchRef, key: &RepoId) -> Result<PathBuf> {
        let path = self.checkout_path(key);
        if path.exists() {
            debug!(path = %path.display(), "Reusing existing checkout");
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = Command::new(&self.gh_binary);
        cmd.args(["repo", "clone", &branch.repo.full_name()])
            .arg(&path)
            .args(["--", "--depth", "1", "--single-branch", "--branch", &branch.name]);
        self.run(cmd, "gh repo clone")?;
        info!(repo = %branch.repo, branch = %branch.name, path = %path.display(), "Cloned branch tip");
        Ok(path)
    }

    fn commit_and_push(&self, path: &Path, branch: &BranchRef, message: &str) -> Result<()> {
        let mut add = self.git(path);
        add.args(["add", "-A"]);
        self.run(add, "git add")?;

        let mut commit = self.git(path);
        commit.args(["commit", "-m", message]);
        self.run(commit, "git commit")?;

        let mut push = self.git(path);
        push.args(["push", "origin", &branch.name]);
        self.run(push, "git push")?;
        info!(repo = %branch.repo, branch = %branch.name, "Pushed remediation commit");
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_dir_all(path).map_err(|e| {
                ConformError::StagingError(format!(
                    "Failed to remove checkout {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!(path = %path.display(), "Removed checkout");
        }
        Ok(())
    }

    fn probe_read(&self, repo: &RepoId) -> bool {
        let url = format!("{}.git", repo.html_url(&self.web_url));
        let mut cmd = Command::new(&self.git_binary);
        cmd.args(["ls-remote", &url]).env("GIT_TERMINAL_PROMPT", "0");
        match self.run(cmd, "git ls-remote") {
            Ok(stdout) => !stdout.trim().is_empty(),
            Err(e) => {
                debug!(repo = %repo, error = %e, "Anonymous listing failed");
                false
            }
        }
    }
}
