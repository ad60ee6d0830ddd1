//! Reference ("template") repository structure.
//!
//! A `Template` is built once per reference repository and then only read.
//! `TemplateRegistry` keeps built templates for the process lifetime and
//! hands out shared handles.

use crate::error::{ConformError, Result};
use crate::remote::RepositoryHost;
use crate::tree::{Node, TreeBuilder, TreeNode};
use crate::types::RepoId;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

/// A reference repository and its materialized tree.
#[derive(Debug, Clone)]
pub struct Template {
    repo: RepoId,
    structure: TreeNode,
    file_list: Vec<String>,
    directories: BTreeSet<String>,
}

impl Template {
    /// Fetch the full structure of `repo`.
    pub fn load(host: &dyn RepositoryHost, repo: &RepoId) -> Result<Self> {
        let mut file_list = Vec::new();
        let mut directories = BTreeSet::new();
        let structure = TreeBuilder::new(host).build_with(repo, "", |descriptor, parent| {
            file_list.push(descriptor.path.clone());
            if !parent.is_empty() {
                directories.insert(parent.to_string());
            }
        })?;
        info!(
            template = %repo,
            files = file_list.len(),
            directories = directories.len(),
            "Loaded template structure"
        );
        Ok(Self {
            repo: repo.clone(),
            structure,
            file_list,
            directories,
        })
    }

    /// Wrap an already built tree.
    pub fn from_tree(repo: RepoId, structure: TreeNode) -> Self {
        let file_list = structure.leaf_paths();
        let directories = file_list
            .iter()
            .filter_map(|p| p.rsplit_once('/').map(|(dir, _)| dir.to_string()))
            .collect();
        Self {
            repo,
            structure,
            file_list,
            directories,
        }
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn structure(&self) -> &TreeNode {
        &self.structure
    }

    /// Every leaf path in listing order.
    pub fn file_list(&self) -> &[String] {
        &self.file_list
    }

    /// Directories that directly contain at least one template file.
    pub fn directories(&self) -> &BTreeSet<String> {
        &self.directories
    }

    /// Indented listing of the structure, directories suffixed with `/`.
    ///
    /// Fails with `TooDeep` when directories nest more than `max_depth`
    /// levels below the root.
    pub fn render(&self, max_depth: usize) -> Result<String> {
        render_tree(&self.structure, max_depth)
    }
}

/// Render any tree the way `Template::render` does.
pub fn render_tree(tree: &TreeNode, max_depth: usize) -> Result<String> {
    let depth = tree.depth();
    if depth > max_depth {
        return Err(ConformError::TooDeep {
            depth,
            max: max_depth,
        });
    }
    let mut out = String::new();
    render_level(tree, 0, &mut out);
    Ok(out)
}

fn render_level(tree: &TreeNode, level: usize, out: &mut String) {
    let indent = "  ".repeat(level);
    for (name, node) in tree {
        match node {
            Node::Leaf(_) => {
                let _ = writeln!(out, "{}{}", indent, name);
            }
            Node::Subtree(sub) => {
                let _ = writeln!(out, "{}{}/", indent, name);
                render_level(sub, level + 1, out);
            }
        }
    }
}

/// Process-wide cache of loaded templates.
pub struct TemplateRegistry {
    templates: RwLock<HashMap<RepoId, Arc<Template>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached template for `repo`, loading it on first use.
    pub fn get_or_load(&self, host: &dyn RepositoryHost, repo: &RepoId) -> Result<Arc<Template>> {
        {
            let map = self.templates.read();
            if let Some(template) = map.get(repo) {
                return Ok(Arc::clone(template));
            }
        }

        // Loaded without the lock held; a racing loader's result wins.
        debug!(template = %repo, "Template not cached, loading");
        let loaded = Template::load(host, repo)?;
        let mut map = self.templates.write();
        Ok(map
            .entry(repo.clone())
            .or_insert_with(|| Arc::new(loaded))
            .clone())
    }

    pub fn insert(&self, template: Template) -> Arc<Template> {
        let template = Arc::new(template);
        self.templates
            .write()
            .insert(template.repo().clone(), Arc::clone(&template));
        template
    }

    pub fn contains(&self, repo: &RepoId) -> bool {
        self.templates.read().contains_key(repo)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryHost;
    use crate::tree::FileDescriptor;

    fn template_host() -> (MemoryHost, RepoId) {
        let repo = RepoId::new("org", "template");
        let host = MemoryHost::new("bot");
        host.add_repository(&repo, "main");
        for path in ["README.md", "LICENSE", "doc/guide.md", ".github/workflows/ci.yml"] {
            host.put_file(&repo, path, b"x");
        }
        (host, repo)
    }

    #[test]
    fn test_load_records_files_and_directories() {
        let (host, repo) = template_host();
        let template = Template::load(&host, &repo).unwrap();
        assert_eq!(template.repo(), &repo);
        assert_eq!(template.file_list().len(), 4);
        assert!(template.file_list().contains(&"doc/guide.md".to_string()));
        let dirs: Vec<_> = template.directories().iter().cloned().collect();
        assert_eq!(dirs, vec![".github/workflows", "doc"]);
        assert_eq!(template.structure().leaf_count(), 4);
    }

    #[test]
    fn test_render_marks_directories() {
        let (host, repo) = template_host();
        let rendered = Template::load(&host, &repo).unwrap().render(4).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                ".github/",
                "  workflows/",
                "    ci.yml",
                "LICENSE",
                "README.md",
                "doc/",
                "  guide.md",
            ]
        );
    }

    #[test]
    fn test_render_refuses_deep_trees() {
        let repo = RepoId::new("o", "deep");
        let tree = TreeNode::from_descriptors(vec![Arc::new(FileDescriptor::new(
            repo.clone(),
            "a/b/c/d/e/f.txt",
            1,
        ))]);
        let template = Template::from_tree(repo, tree);
        assert!(matches!(
            template.render(4),
            Err(ConformError::TooDeep { depth: 5, max: 4 })
        ));
        assert!(template.render(5).is_ok());
    }

    #[test]
    fn test_registry_loads_once() {
        let (host, repo) = template_host();
        let registry = TemplateRegistry::new();
        let first = registry.get_or_load(&host, &repo).unwrap();
        let listings = host.count_calls("list_directory");
        let second = registry.get_or_load(&host, &repo).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(host.count_calls("list_directory"), listings);
        assert!(registry.contains(&repo));
    }

    #[test]
    fn test_registry_does_not_cache_failures() {
        let (host, repo) = template_host();
        let registry = TemplateRegistry::new();
        host.fail_operation("list_directory", "offline");
        assert!(registry.get_or_load(&host, &repo).is_err());
        assert!(!registry.contains(&repo));
        host.clear_failures();
        assert!(registry.get_or_load(&host, &repo).is_ok());
    }
}
