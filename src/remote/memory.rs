//! In-process hosting collaborators.
//!
//! `MemoryHost` keeps repositories, branches, forks, and pull requests in
//! memory; `MemoryCheckout` materializes clones as plain directories and
//! records pushes back into the host. Both support injected failures per
//! operation name so error paths can be exercised without a network.

use crate::error::{ConformError, Result};
use crate::remote::{Checkout, ContentSource, DirectoryEntry, EntryKind, RepositoryHost};
use crate::tree::node::ContentHandle;
use crate::types::{BranchRef, Permission, PullRequest, RepoId, RepoSummary};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
struct RepoState {
    default_branch: String,
    fork: bool,
    files: BTreeMap<String, Vec<u8>>,
    empty_dirs: BTreeSet<String>,
    branches: BTreeMap<String, String>,
    pulls: Vec<PullRequest>,
    permissions: HashMap<String, Permission>,
}

/// A push recorded by `MemoryCheckout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPush {
    pub branch: BranchRef,
    pub message: String,
    pub files: Vec<String>,
}

#[derive(Debug, Default)]
struct HostState {
    repos: BTreeMap<RepoId, RepoState>,
    order: Vec<RepoId>,
    failures: HashMap<String, String>,
    calls: Vec<String>,
    pushes: Vec<RecordedPush>,
    next_pull: u64,
    next_sha: u64,
}

impl HostState {
    fn repo(&self, repo: &RepoId) -> Result<&RepoState> {
        self.repos
            .get(repo)
            .ok_or_else(|| ConformError::LookupFailure(format!("repository {}", repo)))
    }

    fn repo_mut(&mut self, repo: &RepoId) -> Result<&mut RepoState> {
        self.repos
            .get_mut(repo)
            .ok_or_else(|| ConformError::LookupFailure(format!("repository {}", repo)))
    }

    fn fresh_sha(&mut self) -> String {
        self.next_sha += 1;
        format!("{:040x}", self.next_sha)
    }

    fn summary(&self, id: &RepoId) -> Result<RepoSummary> {
        let state = self.repo(id)?;
        Ok(RepoSummary {
            id: id.clone(),
            default_branch: state.default_branch.clone(),
            fork: state.fork,
            archived: false,
        })
    }
}

/// Hosting service held entirely in memory.
pub struct MemoryHost {
    identity: String,
    state: Mutex<HostState>,
}

impl MemoryHost {
    /// Create an empty host acting as `identity`.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state: Mutex::new(HostState::default()),
        }
    }

    /// Register a repository with a single default branch.
    pub fn add_repository(&self, repo: &RepoId, default_branch: &str) {
        let mut state = self.state.lock();
        let sha = state.fresh_sha();
        let mut branches = BTreeMap::new();
        branches.insert(default_branch.to_string(), sha);
        if !state.repos.contains_key(repo) {
            state.order.push(repo.clone());
        }
        state.repos.insert(
            repo.clone(),
            RepoState {
                default_branch: default_branch.to_string(),
                branches,
                ..RepoState::default()
            },
        );
    }

    /// Register a repository that has no commits yet. Its contents cannot be
    /// listed, even at the root.
    pub fn add_empty_repository(&self, repo: &RepoId, default_branch: &str) {
        let mut state = self.state.lock();
        if !state.repos.contains_key(repo) {
            state.order.push(repo.clone());
        }
        state.repos.insert(
            repo.clone(),
            RepoState {
                default_branch: default_branch.to_string(),
                ..RepoState::default()
            },
        );
    }

    pub fn put_file(&self, repo: &RepoId, path: &str, content: &[u8]) {
        let mut state = self.state.lock();
        if let Some(r) = state.repos.get_mut(repo) {
            r.files.insert(path.to_string(), content.to_vec());
        }
    }

    /// Register a directory that lists with no entries.
    pub fn put_empty_dir(&self, repo: &RepoId, path: &str) {
        let mut state = self.state.lock();
        if let Some(r) = state.repos.get_mut(repo) {
            r.empty_dirs.insert(path.to_string());
        }
    }

    pub fn set_permission(&self, repo: &RepoId, identity: &str, permission: Permission) {
        let mut state = self.state.lock();
        if let Some(r) = state.repos.get_mut(repo) {
            r.permissions.insert(identity.to_string(), permission);
        }
    }

    /// Make every later call of `operation` fail with a collaborator failure.
    pub fn fail_operation(&self, operation: &str, message: &str) {
        self.state
            .lock()
            .failures
            .insert(operation.to_string(), message.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Operation log, one `name repo [arg]` line per call.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    pub fn has_repository(&self, repo: &RepoId) -> bool {
        self.state.lock().repos.contains_key(repo)
    }

    pub fn branch_sha(&self, repo: &RepoId, branch: &str) -> Option<String> {
        self.state
            .lock()
            .repos
            .get(repo)
            .and_then(|r| r.branches.get(branch).cloned())
    }

    pub fn pull_requests(&self, repo: &RepoId) -> Vec<PullRequest> {
        self.state
            .lock()
            .repos
            .get(repo)
            .map(|r| r.pulls.clone())
            .unwrap_or_default()
    }

    pub fn pushes(&self) -> Vec<RecordedPush> {
        self.state.lock().pushes.clone()
    }

    fn file_paths(&self, repo: &RepoId) -> Vec<(String, Vec<u8>)> {
        self.state
            .lock()
            .repos
            .get(repo)
            .map(|r| r.files.iter().map(|(p, c)| (p.clone(), c.clone())).collect())
            .unwrap_or_default()
    }

    fn record_push(&self, push: RecordedPush) -> Result<()> {
        let mut state = self.state.lock();
        let sha = state.fresh_sha();
        let repo = state.repo_mut(&push.branch.repo)?;
        repo.branches.insert(push.branch.name.clone(), sha);
        state.pushes.push(push);
        Ok(())
    }

    fn enter(&self, operation: &str, detail: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("{} {}", operation, detail).trim_end().to_string());
        match state.failures.get(operation) {
            Some(message) => Err(ConformError::collaborator(operation, message.clone())),
            None => Ok(()),
        }
    }
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

impl ContentSource for MemoryHost {
    fn fetch_content(&self, handle: &ContentHandle) -> Result<Vec<u8>> {
        self.enter("fetch_content", &format!("{} {}", handle.repo, handle.path))?;
        let state = self.state.lock();
        state
            .repo(&handle.repo)?
            .files
            .get(&handle.path)
            .cloned()
            .ok_or_else(|| {
                ConformError::LookupFailure(format!("{}:{}", handle.repo, handle.path))
            })
    }
}

impl RepositoryHost for MemoryHost {
    fn list_directory(&self, repo: &RepoId, path: &str) -> Result<Vec<DirectoryEntry>> {
        self.enter("list_directory", &format!("{} {}", repo, path))?;
        let state = self.state.lock();
        let r = state.repo(repo)?;
        let path = path.trim_matches('/');
        if r.branches.is_empty() {
            return Err(ConformError::LookupFailure(format!("{} has no commits", repo)));
        }

        let entry = |name: &str, kind: EntryKind, size: u64| {
            let full = join_path(path, name);
            DirectoryEntry {
                name: name.to_string(),
                path: full.clone(),
                kind,
                size,
                content: ContentHandle {
                    repo: repo.clone(),
                    path: full,
                    git_ref: None,
                    download_url: None,
                },
                last_modified: None,
            }
        };

        if let Some(content) = r.files.get(path) {
            let name = path.rsplit('/').next().unwrap_or(path);
            let mut single = entry(name, EntryKind::File, content.len() as u64);
            single.path = path.to_string();
            single.content.path = path.to_string();
            return Ok(vec![single]);
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };
        let mut children: BTreeMap<String, (EntryKind, u64)> = BTreeMap::new();
        for (file_path, content) in &r.files {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.insert(dir.to_string(), (EntryKind::Dir, 0));
                }
                None => {
                    children.insert(rest.to_string(), (EntryKind::File, content.len() as u64));
                }
            }
        }
        for dir in &r.empty_dirs {
            if let Some(rest) = dir.strip_prefix(&prefix) {
                let name = rest.split('/').next().unwrap_or(rest);
                if !name.is_empty() {
                    children.entry(name.to_string()).or_insert((EntryKind::Dir, 0));
                }
            }
        }

        if children.is_empty() && !path.is_empty() && !r.empty_dirs.contains(path) {
            return Err(ConformError::LookupFailure(format!("{}:{}", repo, path)));
        }

        Ok(children
            .into_iter()
            .map(|(name, (kind, size))| entry(&name, kind, size))
            .collect())
    }

    fn get_repository(&self, repo: &RepoId) -> Result<RepoSummary> {
        self.enter("get_repository", &repo.to_string())?;
        self.state.lock().summary(repo)
    }

    fn get_default_branch(&self, repo: &RepoId) -> Result<BranchRef> {
        self.enter("get_default_branch", &repo.to_string())?;
        let state = self.state.lock();
        let r = state.repo(repo)?;
        let sha = r.branches.get(&r.default_branch).cloned().unwrap_or_default();
        Ok(BranchRef {
            repo: repo.clone(),
            name: r.default_branch.clone(),
            sha,
        })
    }

    fn get_branch(&self, repo: &RepoId, name: &str) -> Result<BranchRef> {
        self.enter("get_branch", &format!("{} {}", repo, name))?;
        let state = self.state.lock();
        let sha = state
            .repo(repo)?
            .branches
            .get(name)
            .cloned()
            .ok_or_else(|| ConformError::LookupFailure(format!("branch {} on {}", name, repo)))?;
        Ok(BranchRef {
            repo: repo.clone(),
            name: name.to_string(),
            sha,
        })
    }

    fn create_branch(&self, repo: &RepoId, name: &str, from_sha: &str) -> Result<BranchRef> {
        self.enter("create_branch", &format!("{} {}", repo, name))?;
        let mut state = self.state.lock();
        let r = state.repo_mut(repo)?;
        if r.branches.contains_key(name) {
            return Err(ConformError::collaborator(
                "create_branch",
                format!("Reference refs/heads/{} already exists", name),
            ));
        }
        r.branches.insert(name.to_string(), from_sha.to_string());
        Ok(BranchRef {
            repo: repo.clone(),
            name: name.to_string(),
            sha: from_sha.to_string(),
        })
    }

    fn create_fork(&self, repo: &RepoId) -> Result<RepoId> {
        self.enter("create_fork", &repo.to_string())?;
        let mut state = self.state.lock();
        let fork_id = RepoId::new(self.identity.clone(), repo.name.clone());
        if state.repos.contains_key(&fork_id) {
            return Ok(fork_id);
        }
        let source = state.repo(repo)?;
        let mut fork = RepoState {
            default_branch: source.default_branch.clone(),
            fork: true,
            files: source.files.clone(),
            empty_dirs: source.empty_dirs.clone(),
            branches: source.branches.clone(),
            ..RepoState::default()
        };
        fork.permissions
            .insert(self.identity.clone(), Permission::Admin);
        state.repos.insert(fork_id.clone(), fork);
        state.order.push(fork_id.clone());
        Ok(fork_id)
    }

    fn list_pull_requests(&self, repo: &RepoId) -> Result<Vec<PullRequest>> {
        self.enter("list_pull_requests", &repo.to_string())?;
        Ok(self.state.lock().repo(repo)?.pulls.clone())
    }

    fn create_pull_request(
        &self,
        repo: &RepoId,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest> {
        self.enter("create_pull_request", &format!("{} {} {}", repo, head, base))?;
        let (head_owner, head_ref) = head.split_once(':').ok_or_else(|| {
            ConformError::collaborator("create_pull_request", format!("bad head '{}'", head))
        })?;
        let mut state = self.state.lock();
        let head_repo = RepoId::new(head_owner, repo.name.clone());
        let head_exists = state
            .repos
            .get(&head_repo)
            .map(|r| r.branches.contains_key(head_ref))
            .unwrap_or(false);
        if !head_exists {
            return Err(ConformError::collaborator(
                "create_pull_request",
                format!("head {} does not exist", head),
            ));
        }
        state.next_pull += 1;
        let number = state.next_pull;
        let pull = PullRequest {
            number,
            title: title.to_string(),
            body: body.to_string(),
            html_url: format!("memory://{}/pull/{}", repo, number),
            head_ref: head_ref.to_string(),
            head_owner: head_owner.to_string(),
        };
        state.repo_mut(repo)?.pulls.push(pull.clone());
        Ok(pull)
    }

    fn edit_pull_request(&self, repo: &RepoId, number: u64, title: &str, body: &str) -> Result<()> {
        self.enter("edit_pull_request", &format!("{} {}", repo, number))?;
        let mut state = self.state.lock();
        let pull = state
            .repo_mut(repo)?
            .pulls
            .iter_mut()
            .find(|p| p.number == number)
            .ok_or_else(|| ConformError::LookupFailure(format!("pull #{} on {}", number, repo)))?;
        pull.title = title.to_string();
        pull.body = body.to_string();
        Ok(())
    }

    fn get_collaborator_permission(&self, repo: &RepoId, identity: &str) -> Result<Permission> {
        self.enter("get_collaborator_permission", &format!("{} {}", repo, identity))?;
        let state = self.state.lock();
        let r = state.repo(repo)?;
        if repo.owner == identity {
            return Ok(Permission::Admin);
        }
        r.permissions.get(identity).copied().ok_or_else(|| {
            ConformError::PermissionDenied(format!(
                "{} must have push access to view collaborators of {}",
                identity, repo
            ))
        })
    }

    fn authenticated_user(&self) -> Result<String> {
        self.enter("authenticated_user", "")?;
        Ok(self.identity.clone())
    }

    fn list_repositories(&self, owner: &str) -> Result<Vec<RepoSummary>> {
        self.enter("list_repositories", owner)?;
        let state = self.state.lock();
        state
            .order
            .iter()
            .filter(|id| id.owner == owner)
            .map(|id| state.summary(id))
            .collect()
    }
}

/// Checkout that clones from a `MemoryHost` into plain directories.
pub struct MemoryCheckout<'a> {
    host: &'a MemoryHost,
    root: PathBuf,
    failures: Mutex<HashMap<String, String>>,
    readable: bool,
}

impl<'a> MemoryCheckout<'a> {
    pub fn new(host: &'a MemoryHost, root: impl Into<PathBuf>) -> Self {
        Self {
            host,
            root: root.into(),
            failures: Mutex::new(HashMap::new()),
            readable: true,
        }
    }

    /// Answer for `probe_read`.
    pub fn with_readable(mut self, readable: bool) -> Self {
        self.readable = readable;
        self
    }

    pub fn fail_operation(&self, operation: &str, message: &str) {
        self.failures
            .lock()
            .insert(operation.to_string(), message.to_string());
    }

    fn check(&self, operation: &str) -> Result<()> {
        match self.failures.lock().get(operation) {
            Some(message) => Err(ConformError::collaborator(operation, message.clone())),
            None => Ok(()),
        }
    }
}

fn collect_files(dir: &Path, base: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, base, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}

impl Checkout for MemoryCheckout<'_> {
    fn clone_branch(&self, branch: &BranchRef, key: &RepoId) -> Result<PathBuf> {
        self.check("clone_branch")?;
        let path = self.root.join(&key.owner).join(&key.name);
        if path.exists() {
            return Ok(path);
        }
        std::fs::create_dir_all(&path)?;
        for (file, content) in self.host.file_paths(&branch.repo) {
            let dest = path.join(&file);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, content)?;
        }
        Ok(path)
    }

    fn commit_and_push(&self, path: &Path, branch: &BranchRef, message: &str) -> Result<()> {
        self.check("commit_and_push")?;
        let existing: BTreeSet<String> = self
            .host
            .file_paths(&branch.repo)
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        let mut files = Vec::new();
        collect_files(path, path, &mut files)?;
        files.retain(|f| !existing.contains(f));
        files.sort();
        self.host.record_push(RecordedPush {
            branch: branch.clone(),
            message: message.to_string(),
            files,
        })
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.check("remove")?;
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    fn probe_read(&self, _repo: &RepoId) -> bool {
        self.readable
    }
}
