//! Tree building from directory listings.

use crate::error::Result;
use crate::remote::RepositoryHost;
use crate::tree::node::{FileDescriptor, Node, TreeNode};
use crate::types::RepoId;
use std::sync::Arc;
use tracing::debug;

/// Builds a `TreeNode` for a repository by walking listings one directory
/// at a time.
pub struct TreeBuilder<'a> {
    host: &'a dyn RepositoryHost,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(host: &'a dyn RepositoryHost) -> Self {
        Self { host }
    }

    /// Build the tree rooted at `path` (empty string for the repository root).
    pub fn build(&self, repo: &RepoId, path: &str) -> Result<TreeNode> {
        self.walk(repo, path, &mut None)
    }

    /// Build the tree and call `register(descriptor, parent_dir)` for every
    /// leaf. `parent_dir` is the path of the directory that was listed, not
    /// the leaf's own path; it is empty for leaves at the root.
    pub fn build_with<F>(&self, repo: &RepoId, path: &str, mut register: F) -> Result<TreeNode>
    where
        F: FnMut(&Arc<FileDescriptor>, &str),
    {
        let mut register: Option<&mut dyn FnMut(&Arc<FileDescriptor>, &str)> = Some(&mut register);
        self.walk(repo, path, &mut register)
    }

    fn walk(
        &self,
        repo: &RepoId,
        path: &str,
        register: &mut Option<&mut dyn FnMut(&Arc<FileDescriptor>, &str)>,
    ) -> Result<TreeNode> {
        let entries = self.host.list_directory(repo, path)?;
        debug!(repo = %repo, path, entries = entries.len(), "Listed directory");

        let mut node = TreeNode::new();
        for entry in entries {
            if entry.is_dir() {
                let subtree = self.walk(repo, &entry.path, register)?;
                if subtree.is_empty() {
                    debug!(repo = %repo, path = %entry.path, "Skipping empty directory");
                    continue;
                }
                node.insert(entry.name.clone(), Node::Subtree(subtree));
            } else {
                let name = entry.name.clone();
                let descriptor = Arc::new(entry.into_descriptor());
                if let Some(callback) = register.as_mut() {
                    callback(&descriptor, path);
                }
                node.insert(name, Node::Leaf(descriptor));
            }
        }
        Ok(node)
    }
}
