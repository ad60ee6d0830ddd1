//! Repository tree node types.

use crate::types::RepoId;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where a file's bytes can be fetched from. Resolution is lazy: the
/// descriptor only records the location, a `ContentSource` reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHandle {
    pub repo: RepoId,
    pub path: String,
    /// Ref the listing was taken at; `None` means the default branch.
    pub git_ref: Option<String>,
    pub download_url: Option<String>,
}

/// One file entry from a repository listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// Final path segment.
    pub name: String,
    pub size: u64,
    pub content: ContentHandle,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileDescriptor {
    /// Describe `path` in `repo`, deriving the name from the last segment.
    pub fn new(repo: RepoId, path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            content: ContentHandle {
                repo,
                path: path.clone(),
                git_ref: None,
                download_url: None,
            },
            path,
            name,
            size,
            last_modified: None,
        }
    }
}

/// A tree value: a shared file descriptor or a nested directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Arc<FileDescriptor>),
    Subtree(TreeNode),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

/// Directory contents keyed by entry name.
///
/// Neither the builder nor the differ ever inserts an empty subtree, so any
/// `Subtree` reachable from a root holds at least one leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    entries: BTreeMap<String, Node>,
}

/// The part of a reference tree missing from a candidate. An empty root
/// means nothing is missing.
pub type DiffNode = TreeNode;

impl TreeNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from descriptors, placing each at its own path.
    pub fn from_descriptors<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = Arc<FileDescriptor>>,
    {
        let mut root = TreeNode::new();
        for descriptor in descriptors {
            root.insert_at_path(descriptor);
        }
        root
    }

    /// Insert a leaf at its full path, creating directories along the way.
    /// A file standing where a directory is needed is replaced.
    pub fn insert_at_path(&mut self, descriptor: Arc<FileDescriptor>) {
        let segments: Vec<&str> = descriptor
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let Some((leaf_name, dirs)) = segments.split_last() else {
            return;
        };
        let leaf_name = leaf_name.to_string();
        let mut node = self;
        for dir in dirs {
            let entry = node
                .entries
                .entry(dir.to_string())
                .or_insert_with(|| Node::Subtree(TreeNode::new()));
            if entry.is_leaf() {
                *entry = Node::Subtree(TreeNode::new());
            }
            let Node::Subtree(sub) = entry else {
                return;
            };
            node = sub;
        }
        node.entries.insert(leaf_name, Node::Leaf(descriptor));
    }

    pub fn insert(&mut self, name: impl Into<String>, node: Node) -> Option<Node> {
        self.entries.insert(name.into(), node)
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// True if `name` maps to a leaf at this level.
    pub fn contains_leaf(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Node::Leaf(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Node> {
        self.entries.iter()
    }

    /// Count leaves anywhere below this node. Directories do not count.
    pub fn leaf_count(&self) -> usize {
        self.entries
            .values()
            .map(|node| match node {
                Node::Leaf(_) => 1,
                Node::Subtree(sub) => sub.leaf_count(),
            })
            .sum()
    }

    /// All leaves, depth-first in key order.
    pub fn leaves(&self) -> Vec<Arc<FileDescriptor>> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<Arc<FileDescriptor>>) {
        for node in self.entries.values() {
            match node {
                Node::Leaf(descriptor) => out.push(Arc::clone(descriptor)),
                Node::Subtree(sub) => sub.collect_leaves(out),
            }
        }
    }

    /// Paths of every leaf, keyed by position in the tree rather than by the
    /// descriptor's recorded path.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths("", &mut out);
        out
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, node) in &self.entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            match node {
                Node::Leaf(_) => out.push(path),
                Node::Subtree(sub) => sub.collect_paths(&path, out),
            }
        }
    }

    /// Deepest directory nesting below this node (a flat node has depth 0).
    pub fn depth(&self) -> usize {
        self.entries
            .values()
            .filter_map(|node| match node {
                Node::Subtree(sub) => Some(1 + sub.depth()),
                Node::Leaf(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// JSON view: directories become objects, leaves become `{path, size}`.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, node) in &self.entries {
            let value = match node {
                Node::Leaf(descriptor) => json!({
                    "path": descriptor.path,
                    "size": descriptor.size,
                }),
                Node::Subtree(sub) => sub.to_json(),
            };
            map.insert(name.clone(), value);
        }
        Value::Object(map)
    }
}

impl<'a> IntoIterator for &'a TreeNode {
    type Item = (&'a String, &'a Node);
    type IntoIter = btree_map::Iter<'a, String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
