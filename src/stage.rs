//! Staging of missing template files into a local working copy.

use crate::error::{ConformError, Result};
use crate::remote::ContentSource;
use crate::tree::{DiffNode, FileDescriptor, Node};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a staging pass produced.
///
/// Entries are keyed by bare file name, so two missing files with the same
/// name in different directories share one entry and the one staged last
/// wins. Both files are still written; `collisions` lists the names
/// affected.
#[derive(Debug, Clone, Default)]
pub struct ChangeManifest {
    entries: BTreeMap<String, Arc<FileDescriptor>>,
    written: Vec<String>,
    skipped: Vec<String>,
    collisions: Vec<String>,
}

impl ChangeManifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FileDescriptor>> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Arc<FileDescriptor>)> {
        self.entries.iter()
    }

    /// Paths written during this pass.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Paths left alone because the destination already existed.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    fn record(&mut self, descriptor: &Arc<FileDescriptor>) {
        let previous = self
            .entries
            .insert(descriptor.name.clone(), Arc::clone(descriptor));
        if let Some(previous) = previous {
            if previous.path != descriptor.path && !self.collisions.contains(&descriptor.name) {
                warn!(
                    name = %descriptor.name,
                    kept = %descriptor.path,
                    dropped = %previous.path,
                    "Manifest entries collide on file name"
                );
                self.collisions.push(descriptor.name.clone());
            }
        }
    }
}

/// Write every leaf of `diff` under `root`, fetching bytes from `source`.
///
/// Existing destinations are never overwritten, so staging the same diff
/// twice writes nothing the second time.
pub fn stage<S>(diff: &DiffNode, root: &Path, source: &S) -> Result<ChangeManifest>
where
    S: ContentSource + ?Sized,
{
    let mut manifest = ChangeManifest::default();
    stage_level(diff, root, source, &mut manifest)?;
    debug!(
        root = %root.display(),
        written = manifest.written.len(),
        skipped = manifest.skipped.len(),
        "Staged missing files"
    );
    Ok(manifest)
}

fn stage_level<S: ContentSource + ?Sized>(
    node: &DiffNode,
    root: &Path,
    source: &S,
    manifest: &mut ChangeManifest,
) -> Result<()> {
    for (_, value) in node {
        match value {
            Node::Subtree(sub) => stage_level(sub, root, source, manifest)?,
            Node::Leaf(descriptor) => {
                stage_file(descriptor, root, source, manifest)?;
                manifest.record(descriptor);
            }
        }
    }
    Ok(())
}

fn stage_file<S: ContentSource + ?Sized>(
    descriptor: &FileDescriptor,
    root: &Path,
    source: &S,
    manifest: &mut ChangeManifest,
) -> Result<()> {
    let dest = destination(root, &descriptor.path)?;
    if dest.exists() {
        debug!(path = %descriptor.path, "Destination exists, skipping");
        manifest.skipped.push(descriptor.path.clone());
        return Ok(());
    }

    let bytes = source.fetch_content(&descriptor.content)?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConformError::StagingError(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(&dest, bytes).map_err(|e| {
        ConformError::StagingError(format!("Failed to write {}: {}", dest.display(), e))
    })?;
    manifest.written.push(descriptor.path.clone());
    Ok(())
}

/// Resolve a repository-relative path under `root`, refusing anything that
/// would escape it.
fn destination(root: &Path, repo_path: &str) -> Result<PathBuf> {
    let relative: PathBuf = repo_path.split('/').filter(|s| !s.is_empty()).collect();
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes || relative.as_os_str().is_empty() {
        return Err(ConformError::StagingError(format!(
            "Refusing to stage outside the working copy: {}",
            repo_path
        )));
    }
    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryHost;
    use crate::tree::{TreeBuilder, TreeNode};
    use crate::types::RepoId;

    fn template(files: &[(&str, &[u8])]) -> (MemoryHost, TreeNode) {
        let repo = RepoId::new("org", "template");
        let host = MemoryHost::new("bot");
        host.add_repository(&repo, "main");
        for (path, content) in files {
            host.put_file(&repo, path, content);
        }
        let tree = TreeBuilder::new(&host).build(&repo, "").unwrap();
        (host, tree)
    }

    #[test]
    fn test_stage_writes_nested_files() {
        let (host, tree) = template(&[("LICENSE", b"MIT"), (".github/workflows/ci.yml", b"on: push")]);
        let temp = tempfile::tempdir().unwrap();
        let manifest = stage(&tree, temp.path(), &host).unwrap();

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.written(), &[".github/workflows/ci.yml", "LICENSE"]);
        assert_eq!(
            std::fs::read(temp.path().join(".github/workflows/ci.yml")).unwrap(),
            b"on: push"
        );
        assert_eq!(std::fs::read(temp.path().join("LICENSE")).unwrap(), b"MIT");
    }

    #[test]
    fn test_existing_destination_is_skipped_but_recorded() {
        let (host, tree) = template(&[("LICENSE", b"MIT")]);
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("LICENSE"), b"Apache").unwrap();

        let manifest = stage(&tree, temp.path(), &host).unwrap();
        assert_eq!(manifest.skipped(), &["LICENSE"]);
        assert!(manifest.written().is_empty());
        assert!(manifest.get("LICENSE").is_some());
        assert_eq!(std::fs::read(temp.path().join("LICENSE")).unwrap(), b"Apache");
        assert_eq!(host.count_calls("fetch_content"), 0);
    }

    #[test]
    fn test_restaging_writes_nothing() {
        let (host, tree) = template(&[("a.txt", b"1"), ("dir/b.txt", b"2")]);
        let temp = tempfile::tempdir().unwrap();
        stage(&tree, temp.path(), &host).unwrap();
        let again = stage(&tree, temp.path(), &host).unwrap();
        assert!(again.written().is_empty());
        assert_eq!(again.skipped().len(), 2);
    }

    #[test]
    fn test_same_name_collides_in_manifest_but_both_written() {
        let (host, tree) = template(&[("a/README.md", b"a"), ("b/README.md", b"b")]);
        let temp = tempfile::tempdir().unwrap();
        let manifest = stage(&tree, temp.path(), &host).unwrap();

        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("README.md").unwrap().path, "b/README.md");
        assert_eq!(manifest.collisions(), &["README.md"]);
        assert!(temp.path().join("a/README.md").exists());
        assert!(temp.path().join("b/README.md").exists());
    }

    #[test]
    fn test_empty_diff_stages_nothing() {
        let host = MemoryHost::new("bot");
        let temp = tempfile::tempdir().unwrap();
        let manifest = stage(&TreeNode::new(), temp.path(), &host).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_fetch_failure_propagates() {
        let (host, tree) = template(&[("LICENSE", b"MIT")]);
        host.fail_operation("fetch_content", "offline");
        let temp = tempfile::tempdir().unwrap();
        assert!(stage(&tree, temp.path(), &host).is_err());
        assert!(!temp.path().join("LICENSE").exists());
    }

    #[test]
    fn test_destination_rejects_escapes() {
        let root = Path::new("/work");
        assert!(destination(root, "../etc/passwd").is_err());
        assert!(destination(root, "").is_err());
        assert_eq!(destination(root, "a/b.txt").unwrap(), root.join("a").join("b.txt"));
    }
}
