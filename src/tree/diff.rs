//! Presence diff between a reference tree and a candidate tree.
//!
//! The diff is asymmetric: it answers "which parts of the reference are
//! missing from the candidate". Extra candidate entries never show up, and
//! file contents are never compared.

use crate::tree::node::{DiffNode, Node, TreeNode};

/// Top-level entry whose presence lets a missing `doc` directory slide.
pub const README_FILE: &str = "README.md";

/// Top-level documentation directory subject to suppression.
pub const DOC_DIR: &str = "doc";

/// Compute the part of `reference` missing from `candidate`.
///
/// After the recursive pass, a top-level `doc` entry is dropped unless
/// `README.md` is itself missing. The rule applies at the root only.
pub fn diff(reference: &TreeNode, candidate: Option<&TreeNode>) -> DiffNode {
    let mut result = diff_level(reference, candidate);
    if !result.contains_leaf(README_FILE) && result.contains_key(DOC_DIR) {
        result.remove(DOC_DIR);
    }
    result
}

fn diff_level(reference: &TreeNode, candidate: Option<&TreeNode>) -> DiffNode {
    let mut out = DiffNode::new();
    for (name, value) in reference {
        let other = candidate.and_then(|c| c.get(name));
        match (value, other) {
            (Node::Leaf(descriptor), None | Some(Node::Subtree(_))) => {
                out.insert(name.clone(), Node::Leaf(descriptor.clone()));
            }
            (Node::Leaf(_), Some(Node::Leaf(_))) => {}
            (Node::Subtree(sub), None | Some(Node::Leaf(_))) => {
                insert_nonempty(&mut out, name, diff_level(sub, None));
            }
            (Node::Subtree(sub), Some(Node::Subtree(other_sub))) => {
                insert_nonempty(&mut out, name, diff_level(sub, Some(other_sub)));
            }
        }
    }
    out
}

fn insert_nonempty(out: &mut DiffNode, name: &str, subdiff: DiffNode) {
    if !subdiff.is_empty() {
        out.insert(name.to_string(), Node::Subtree(subdiff));
    }
}
