//! Memoizing decorator around a `RepositoryHost`.
//!
//! Read calls are cached per call signature for the lifetime of the
//! decorator. Mutations and branch probes always reach the wrapped host.
//! Nothing is invalidated implicitly; callers use `invalidate_repo` or
//! `clear` when they know the remote side changed.

use crate::error::Result;
use crate::remote::{ContentSource, DirectoryEntry, RepositoryHost};
use crate::tree::node::ContentHandle;
use crate::types::{BranchRef, Permission, PullRequest, RepoId, RepoSummary};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

/// Hit/miss counters across every cached call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

type Memo<K, V> = Mutex<HashMap<K, V>>;

pub struct CachedHost<H> {
    inner: H,
    listings: Memo<(RepoId, String), Vec<DirectoryEntry>>,
    repositories: Memo<RepoId, RepoSummary>,
    default_branches: Memo<RepoId, BranchRef>,
    permissions: Memo<(RepoId, String), Permission>,
    owner_repositories: Memo<String, Vec<RepoSummary>>,
    contents: Memo<ContentHandle, Vec<u8>>,
    stats: Mutex<CacheStats>,
}

impl<H: RepositoryHost> CachedHost<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            listings: Mutex::new(HashMap::new()),
            repositories: Mutex::new(HashMap::new()),
            default_branches: Mutex::new(HashMap::new()),
            permissions: Mutex::new(HashMap::new()),
            owner_repositories: Mutex::new(HashMap::new()),
            contents: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    /// Drop every cached answer that mentions `repo`.
    pub fn invalidate_repo(&self, repo: &RepoId) {
        self.listings.lock().retain(|(r, _), _| r != repo);
        self.repositories.lock().remove(repo);
        self.default_branches.lock().remove(repo);
        self.permissions.lock().retain(|(r, _), _| r != repo);
        self.owner_repositories.lock().remove(&repo.owner);
        self.contents.lock().retain(|handle, _| &handle.repo != repo);
    }

    pub fn clear(&self) {
        self.listings.lock().clear();
        self.repositories.lock().clear();
        self.default_branches.lock().clear();
        self.permissions.lock().clear();
        self.owner_repositories.lock().clear();
        self.contents.lock().clear();
    }

    // The lock is not held while the inner host runs, so a slow call never
    // blocks unrelated lookups. Failures are not cached.
    fn memo<K, V, F>(&self, map: &Memo<K, V>, key: K, fetch: F) -> Result<V>
    where
        K: Eq + Hash,
        V: Clone,
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = map.lock().get(&key) {
            self.stats.lock().hits += 1;
            trace!("Cache hit");
            return Ok(value.clone());
        }
        self.stats.lock().misses += 1;
        let value = fetch()?;
        map.lock().insert(key, value.clone());
        Ok(value)
    }
}

impl<H: RepositoryHost> ContentSource for CachedHost<H> {
    fn fetch_content(&self, handle: &ContentHandle) -> Result<Vec<u8>> {
        self.memo(&self.contents, handle.clone(), || {
            self.inner.fetch_content(handle)
        })
    }
}

impl<H: RepositoryHost> RepositoryHost for CachedHost<H> {
    fn list_directory(&self, repo: &RepoId, path: &str) -> Result<Vec<DirectoryEntry>> {
        self.memo(&self.listings, (repo.clone(), path.to_string()), || {
            self.inner.list_directory(repo, path)
        })
    }

    fn get_repository(&self, repo: &RepoId) -> Result<RepoSummary> {
        self.memo(&self.repositories, repo.clone(), || {
            self.inner.get_repository(repo)
        })
    }

    fn get_default_branch(&self, repo: &RepoId) -> Result<BranchRef> {
        self.memo(&self.default_branches, repo.clone(), || {
            self.inner.get_default_branch(repo)
        })
    }

    fn get_branch(&self, repo: &RepoId, name: &str) -> Result<BranchRef> {
        self.inner.get_branch(repo, name)
    }

    fn create_branch(&self, repo: &RepoId, name: &str, from_sha: &str) -> Result<BranchRef> {
        self.inner.create_branch(repo, name, from_sha)
    }

    fn create_fork(&self, repo: &RepoId) -> Result<RepoId> {
        self.inner.create_fork(repo)
    }

    fn list_pull_requests(&self, repo: &RepoId) -> Result<Vec<PullRequest>> {
        self.inner.list_pull_requests(repo)
    }

    fn create_pull_request(
        &self,
        repo: &RepoId,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest> {
        self.inner.create_pull_request(repo, title, body, head, base)
    }

    fn edit_pull_request(&self, repo: &RepoId, number: u64, title: &str, body: &str) -> Result<()> {
        self.inner.edit_pull_request(repo, number, title, body)
    }

    fn get_collaborator_permission(&self, repo: &RepoId, identity: &str) -> Result<Permission> {
        self.memo(
            &self.permissions,
            (repo.clone(), identity.to_string()),
            || self.inner.get_collaborator_permission(repo, identity),
        )
    }

    fn authenticated_user(&self) -> Result<String> {
        self.inner.authenticated_user()
    }

    fn list_repositories(&self, owner: &str) -> Result<Vec<RepoSummary>> {
        self.memo(&self.owner_repositories, owner.to_string(), || {
            self.inner.list_repositories(owner)
        })
    }
}
