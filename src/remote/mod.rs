//! Hosting collaborators: the repository listing API, file content access,
//! and the local checkout used for staging.
//!
//! The pipeline only talks to these traits. `GhHost` drives the GitHub CLI,
//! `MemoryHost` keeps everything in process, and `CachedHost` memoizes reads
//! of any other host.

pub mod cache;
pub mod checkout;
pub mod gh;
pub mod memory;

use crate::error::Result;
use crate::tree::node::{ContentHandle, FileDescriptor};
use crate::types::{BranchRef, Permission, PullRequest, RepoId, RepoSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cache::{CacheStats, CachedHost};
pub use checkout::{Checkout, GitCheckout};
pub use gh::GhHost;
pub use memory::MemoryHost;

/// Kind of a directory listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// One immediate child returned by `list_directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub content: ContentHandle,
    pub last_modified: Option<DateTime<Utc>>,
}

impl DirectoryEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn into_descriptor(self) -> FileDescriptor {
        FileDescriptor {
            path: self.path,
            name: self.name,
            size: self.size,
            content: self.content,
            last_modified: self.last_modified,
        }
    }
}

/// Reads file bytes behind a lazy content handle.
pub trait ContentSource {
    fn fetch_content(&self, handle: &ContentHandle) -> Result<Vec<u8>>;
}

/// Narrow query/mutation surface of the hosting service.
///
/// Every call may fail; callers treat failures as opaque and never retry.
/// Absent repositories, paths, and branches are reported as
/// `ConformError::LookupFailure`.
pub trait RepositoryHost: ContentSource {
    /// Immediate entries at `path` (empty string for the root).
    fn list_directory(&self, repo: &RepoId, path: &str) -> Result<Vec<DirectoryEntry>>;

    fn get_repository(&self, repo: &RepoId) -> Result<RepoSummary>;

    fn get_default_branch(&self, repo: &RepoId) -> Result<BranchRef>;

    fn get_branch(&self, repo: &RepoId, name: &str) -> Result<BranchRef>;

    fn create_branch(&self, repo: &RepoId, name: &str, from_sha: &str) -> Result<BranchRef>;

    /// Fork `repo` into the acting identity's account.
    fn create_fork(&self, repo: &RepoId) -> Result<RepoId>;

    /// Open pull requests on `repo`.
    fn list_pull_requests(&self, repo: &RepoId) -> Result<Vec<PullRequest>>;

    /// `head` is `owner:branch`, `base` a branch name on `repo`.
    fn create_pull_request(
        &self,
        repo: &RepoId,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest>;

    fn edit_pull_request(&self, repo: &RepoId, number: u64, title: &str, body: &str)
        -> Result<()>;

    fn get_collaborator_permission(&self, repo: &RepoId, identity: &str) -> Result<Permission>;

    /// Login of the identity the host acts as.
    fn authenticated_user(&self) -> Result<String>;

    /// Repositories owned by a user or organization, in listing order.
    fn list_repositories(&self, owner: &str) -> Result<Vec<RepoSummary>>;
}
