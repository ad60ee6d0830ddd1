//! Compliance evaluation of a candidate repository against a template.

use crate::error::Result;
use crate::remote::RepositoryHost;
use crate::template::Template;
use crate::tree::{diff, DiffNode, TreeBuilder, TreeNode};
use crate::types::RepoId;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Outcome of comparing one candidate with a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceReport {
    pub repo: RepoId,
    pub template: RepoId,
    /// True when at least one template file is absent.
    pub missing: bool,
    /// Present exactly when `missing` is true.
    pub diff: Option<DiffNode>,
    /// Leaves in the diff; shown as "missing at least N files".
    pub missing_count: usize,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        !self.missing
    }

    pub fn missing_paths(&self) -> Vec<String> {
        self.diff
            .as_ref()
            .map(|d| d.leaf_paths())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "repository": self.repo.full_name(),
            "template": self.template.full_name(),
            "compliant": self.is_compliant(),
            "missing_count": self.missing_count,
            "missing": self.missing_paths(),
            "diff": self.diff.as_ref().map(|d| d.to_json()),
        })
    }
}

/// Build the candidate's tree through `host` and compare it with `template`.
///
/// A repository that does not exist is a lookup failure. An existing one
/// whose root cannot be listed (no commits yet) is treated as empty, so the
/// whole template counts as missing.
pub fn evaluate(
    host: &dyn RepositoryHost,
    candidate: &RepoId,
    template: &Template,
) -> Result<ComplianceReport> {
    host.get_repository(candidate)?;
    let tree = match TreeBuilder::new(host).build(candidate, "") {
        Ok(tree) => Some(tree),
        Err(e) if e.is_lookup_failure() => {
            debug!(repo = %candidate, error = %e, "Candidate root not listable, treating as empty");
            None
        }
        Err(e) => return Err(e),
    };
    Ok(report(candidate, tree.as_ref(), template))
}

/// Compare an already built candidate tree with `template`.
pub fn evaluate_tree(candidate: &RepoId, tree: &TreeNode, template: &Template) -> ComplianceReport {
    report(candidate, Some(tree), template)
}

fn report(candidate: &RepoId, tree: Option<&TreeNode>, template: &Template) -> ComplianceReport {
    let missing_tree = diff(template.structure(), tree);
    let missing_count = missing_tree.leaf_count();
    info!(
        repo = %candidate,
        template = %template.repo(),
        missing = missing_count,
        "Evaluated compliance"
    );
    let (missing, diff) = if missing_count == 0 {
        (false, None)
    } else {
        (true, Some(missing_tree))
    };
    ComplianceReport {
        repo: candidate.clone(),
        template: template.repo().clone(),
        missing,
        diff,
        missing_count,
    }
}
