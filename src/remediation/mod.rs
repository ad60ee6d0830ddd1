//! Remediation workflow: from a compliance diff to a pull request.
//!
//! One target moves through
//! `Idle -> PermissionChecked -> BranchReady -> Staged -> CommitPushed ->
//! PullRequestOpen -> Done`, or stops in `Aborted` when the operator
//! declines or there is nothing to stage. The local checkout is removed
//! whenever a run ends, whatever the outcome.

pub mod batch;
pub mod body;
pub mod operator;

pub use batch::{scan, BatchEntry, BatchReport, BatchStatus, ScanEntry};
pub use operator::{AutoApprove, Decision, Gate, Operator, ScriptedOperator};

use crate::compliance::{evaluate, ComplianceReport};
use crate::error::{ConformError, Result};
use crate::remote::{Checkout, RepositoryHost};
use crate::stage::{stage, ChangeManifest};
use crate::template::Template;
use crate::types::{BranchRef, PullRequest, RepoId, RepoPermissions};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const DEFAULT_BRANCH: &str = "repository_management_bot/template_compliance";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Add missing files to make repo compliant with template";
pub const DEFAULT_PR_TITLE: &str = "Enforce Template Compliance";
pub const DEFAULT_ATTRIBUTION_NAME: &str = "Repository Management Bot";
pub const DEFAULT_ATTRIBUTION_URL: &str = "https://github.com/chp2001/repository-management-bot";
pub const DEFAULT_WEB_URL: &str = "https://github.com";

/// Fixed names and texts used by every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationSettings {
    pub branch: String,
    pub commit_message: String,
    pub pr_title: String,
    pub attribution_name: String,
    pub attribution_url: String,
    pub web_url: String,
}

impl Default for RemediationSettings {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            pr_title: DEFAULT_PR_TITLE.to_string(),
            attribution_name: DEFAULT_ATTRIBUTION_NAME.to_string(),
            attribution_url: DEFAULT_ATTRIBUTION_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemediationState {
    Idle,
    PermissionChecked,
    BranchReady,
    Staged,
    CommitPushed,
    PullRequestOpen,
    Done,
    Aborted,
}

/// Why a run stopped without a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    /// Nothing from the template is missing.
    Compliant,
    Declined(Gate),
    /// The operator asked to stop the whole batch.
    Quit,
    /// Staging produced no manifest entries.
    EmptyManifest,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Compliant => write!(f, "already compliant"),
            AbortReason::Declined(gate) => write!(f, "declined {}", gate),
            AbortReason::Quit => write!(f, "quit requested"),
            AbortReason::EmptyManifest => write!(f, "nothing to stage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A pull request exists for the remediation branch.
    Done {
        pull_request: PullRequest,
        /// True when an already open pull request was edited.
        updated: bool,
        /// Paths written and pushed in this run.
        written: Vec<String>,
    },
    Aborted(AbortReason),
}

/// Record of one target's run.
#[derive(Debug, Clone)]
pub struct RemediationRun {
    pub target: RepoId,
    pub report: ComplianceReport,
    /// Every state entered, in order.
    pub states: Vec<RemediationState>,
    pub outcome: Outcome,
}

impl RemediationRun {
    pub fn final_state(&self) -> RemediationState {
        self.states
            .last()
            .copied()
            .unwrap_or(RemediationState::Idle)
    }
}

/// Removes a checkout when dropped.
struct CheckoutGuard<'a> {
    checkout: &'a dyn Checkout,
    path: PathBuf,
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.checkout.remove(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove checkout");
        }
    }
}

/// Drives the workflow for single targets against injected collaborators.
pub struct Remediator<'a> {
    host: &'a dyn RepositoryHost,
    checkout: &'a dyn Checkout,
    operator: &'a dyn Operator,
    settings: RemediationSettings,
}

impl<'a> Remediator<'a> {
    pub fn new(
        host: &'a dyn RepositoryHost,
        checkout: &'a dyn Checkout,
        operator: &'a dyn Operator,
        settings: RemediationSettings,
    ) -> Self {
        Self {
            host,
            checkout,
            operator,
            settings,
        }
    }

    /// Evaluate `target` and, if anything is missing, remediate it.
    pub fn remediate(&self, template: &Template, target: &RepoId) -> Result<RemediationRun> {
        let report = evaluate(self.host, target, template)?;
        self.remediate_report(template, report)
    }

    /// Remediate from an existing compliance report.
    pub fn remediate_report(
        &self,
        template: &Template,
        report: ComplianceReport,
    ) -> Result<RemediationRun> {
        let target = report.repo.clone();
        let mut states = vec![RemediationState::Idle];
        let outcome = self.run(template, &report, &mut states)?;
        if let Outcome::Aborted(reason) = &outcome {
            info!(repo = %target, %reason, "Remediation aborted");
            states.push(RemediationState::Aborted);
        } else {
            states.push(RemediationState::Done);
        }
        Ok(RemediationRun {
            target,
            report,
            states,
            outcome,
        })
    }

    fn run(
        &self,
        template: &Template,
        report: &ComplianceReport,
        states: &mut Vec<RemediationState>,
    ) -> Result<Outcome> {
        let target = &report.repo;
        let Some(diff) = report.diff.as_ref() else {
            return Ok(Outcome::Aborted(AbortReason::Compliant));
        };

        let summary = format!(
            "{} is missing at least {} files:\n{}",
            target,
            report.missing_count,
            report.missing_paths().join("\n")
        );
        if let Some(reason) = self.gate(Gate::BeforeStaging, target, &summary)? {
            return Ok(Outcome::Aborted(reason));
        }

        let identity = self.host.authenticated_user()?;
        let permissions = self.check_permissions(target, &identity);
        enter(states, target, RemediationState::PermissionChecked);

        let branch = self.prepare_branch(target, &identity, permissions)?;
        enter(states, target, RemediationState::BranchReady);

        let path = self.checkout.clone_branch(&branch, target)?;
        let _guard = CheckoutGuard {
            checkout: self.checkout,
            path: path.clone(),
        };
        let manifest = stage(diff, &path, self.host)?;
        if manifest.is_empty() {
            return Ok(Outcome::Aborted(AbortReason::EmptyManifest));
        }
        enter(states, target, RemediationState::Staged);

        let summary = format!(
            "Push {} new files to {}:{} and open a pull request on {}?",
            manifest.written().len(),
            branch.repo,
            branch.name,
            target
        );
        if let Some(reason) = self.gate(Gate::BeforePush, target, &summary)? {
            return Ok(Outcome::Aborted(reason));
        }

        if manifest.written().is_empty() {
            // Every file is already on the reused branch.
            debug!(repo = %target, "Nothing new to commit");
        } else {
            self.checkout
                .commit_and_push(&path, &branch, &self.settings.commit_message)?;
            enter(states, target, RemediationState::CommitPushed);
        }

        let (pull_request, updated) =
            self.open_or_update_pull_request(template, target, &branch, &manifest)?;
        enter(states, target, RemediationState::PullRequestOpen);

        Ok(Outcome::Done {
            pull_request,
            updated,
            written: manifest.written().to_vec(),
        })
    }

    fn gate(&self, gate: Gate, target: &RepoId, summary: &str) -> Result<Option<AbortReason>> {
        Ok(match self.operator.confirm(gate, target, summary)? {
            Decision::Proceed => None,
            Decision::Skip => Some(AbortReason::Declined(gate)),
            Decision::Quit => Some(AbortReason::Quit),
        })
    }

    /// Rights of `identity` on `target`. When the permission query fails
    /// push is assumed impossible and read access is probed anonymously.
    pub fn check_permissions(&self, target: &RepoId, identity: &str) -> RepoPermissions {
        match self.host.get_collaborator_permission(target, identity) {
            Ok(level) => RepoPermissions {
                push: level.can_push(),
                read: level.can_read(),
            },
            Err(e) => {
                debug!(repo = %target, error = %e, "Permission query failed, probing read access");
                RepoPermissions {
                    push: false,
                    read: self.checkout.probe_read(target),
                }
            }
        }
    }

    /// Pick the repository that receives the branch (the target itself, or a
    /// fork of it) and make sure the remediation branch exists there.
    pub fn prepare_branch(
        &self,
        target: &RepoId,
        identity: &str,
        permissions: RepoPermissions,
    ) -> Result<BranchRef> {
        let destination = if permissions.push {
            target.clone()
        } else if permissions.read {
            self.fork_for(target, identity)?
        } else {
            return Err(ConformError::PermissionDenied(format!(
                "{} can neither push to nor read {}",
                identity, target
            )));
        };

        match self.host.get_branch(&destination, &self.settings.branch) {
            Ok(branch) => {
                debug!(repo = %destination, branch = %branch.name, "Reusing remediation branch");
                Ok(branch)
            }
            Err(e) if e.is_lookup_failure() => {
                let base = self.host.get_default_branch(&destination)?;
                let branch =
                    self.host
                        .create_branch(&destination, &self.settings.branch, &base.sha)?;
                info!(repo = %destination, branch = %branch.name, from = %base.name, "Created remediation branch");
                Ok(branch)
            }
            Err(e) => Err(e),
        }
    }

    fn fork_for(&self, target: &RepoId, identity: &str) -> Result<RepoId> {
        let existing = RepoId::new(identity, target.name.clone());
        match self.host.get_repository(&existing) {
            Ok(summary) => {
                if !summary.fork {
                    warn!(repo = %existing, "Reusing a repository that is not a fork");
                }
                Ok(summary.id)
            }
            Err(e) if e.is_lookup_failure() => {
                let fork = self.host.create_fork(target)?;
                info!(repo = %target, fork = %fork, "Created fork");
                Ok(fork)
            }
            Err(e) => Err(e),
        }
    }

    fn open_or_update_pull_request(
        &self,
        template: &Template,
        target: &RepoId,
        branch: &BranchRef,
        manifest: &ChangeManifest,
    ) -> Result<(PullRequest, bool)> {
        let title = &self.settings.pr_title;
        let body = body::render(&self.settings, template.repo(), target, &branch.repo, manifest);

        let existing = self
            .host
            .list_pull_requests(target)?
            .into_iter()
            .find(|pr| pr.head_ref == branch.name);
        if let Some(mut pr) = existing {
            self.host.edit_pull_request(target, pr.number, title, &body)?;
            info!(repo = %target, number = pr.number, "Updated pull request");
            pr.title = title.clone();
            pr.body = body;
            return Ok((pr, true));
        }

        let base = self.host.get_default_branch(target)?;
        let head = format!("{}:{}", branch.repo.owner, branch.name);
        let pr = self
            .host
            .create_pull_request(target, title, &body, &head, &base.name)?;
        info!(repo = %target, number = pr.number, url = %pr.html_url, "Opened pull request");
        Ok((pr, false))
    }
}

fn enter(states: &mut Vec<RemediationState>, target: &RepoId, state: RemediationState) {
    debug!(repo = %target, ?state, "Remediation state");
    states.push(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryCheckout;
    use crate::remote::MemoryHost;
    use crate::types::Permission;
    use RemediationState::*;

    const TEMPLATE_FILES: &[&str] = &["README.md", "LICENSE", ".github/CODEOWNERS"];

    struct Fixture {
        host: MemoryHost,
        template: Template,
        target: RepoId,
        temp: tempfile::TempDir,
    }

    fn fixture(identity: &str) -> Fixture {
        let host = MemoryHost::new(identity);
        let template_repo = RepoId::new("org", "template");
        let target = RepoId::new("org", "project");
        host.add_repository(&template_repo, "main");
        for path in TEMPLATE_FILES {
            host.put_file(&template_repo, path, path.as_bytes());
        }
        host.add_repository(&target, "main");
        host.put_file(&target, "README.md", b"# project");
        let template = Template::load(&host, &template_repo).unwrap();
        Fixture {
            host,
            template,
            target,
            temp: tempfile::tempdir().unwrap(),
        }
    }

    fn run_with(f: &Fixture, operator: &dyn Operator) -> Result<RemediationRun> {
        let checkout = MemoryCheckout::new(&f.host, f.temp.path());
        Remediator::new(&f.host, &checkout, operator, RemediationSettings::default())
            .remediate(&f.template, &f.target)
    }

    #[test]
    fn test_push_access_remediates_target_directly() {
        let f = fixture("bot");
        f.host.set_permission(&f.target, "bot", Permission::Write);
        let run = run_with(&f, &AutoApprove).unwrap();

        assert_eq!(
            run.states,
            vec![Idle, PermissionChecked, BranchReady, Staged, CommitPushed, PullRequestOpen, Done]
        );
        let Outcome::Done { pull_request, updated, written } = &run.outcome else {
            panic!("expected done, got {:?}", run.outcome);
        };
        assert!(!updated);
        assert_eq!(written, &vec![".github/CODEOWNERS".to_string(), "LICENSE".to_string()]);
        assert_eq!(pull_request.head_owner, "org");
        assert_eq!(pull_request.head_ref, DEFAULT_BRANCH);

        let pushes = f.host.pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].branch.repo, f.target);
        assert_eq!(pushes[0].message, DEFAULT_COMMIT_MESSAGE);
        assert_eq!(pushes[0].files, vec![".github/CODEOWNERS", "LICENSE"]);
        assert!(f.host.branch_sha(&f.target, DEFAULT_BRANCH).is_some());
        assert_eq!(f.host.count_calls("create_fork"), 0);
    }

    #[test]
    fn test_without_push_access_uses_fork() {
        let f = fixture("bot");
        let run = run_with(&f, &AutoApprove).unwrap();

        let fork = RepoId::new("bot", "project");
        assert!(f.host.has_repository(&fork));
        assert!(f.host.branch_sha(&fork, DEFAULT_BRANCH).is_some());
        assert!(f.host.branch_sha(&f.target, DEFAULT_BRANCH).is_none());
        let Outcome::Done { pull_request, .. } = &run.outcome else {
            panic!("expected done, got {:?}", run.outcome);
        };
        assert_eq!(pull_request.head_owner, "bot");
        assert!(pull_request
            .body
            .contains("https://github.com/bot/project/tree/repository_management_bot/template_compliance/LICENSE"));
        assert_eq!(f.host.pull_requests(&f.target).len(), 1);
    }

    #[test]
    fn test_existing_fork_is_reused() {
        let f = fixture("bot");
        let fork = RepoId::new("bot", "project");
        f.host.add_repository(&fork, "main");
        run_with(&f, &AutoApprove).unwrap();
        assert_eq!(f.host.count_calls("create_fork"), 0);
        assert!(f.host.branch_sha(&fork, DEFAULT_BRANCH).is_some());
    }

    #[test]
    fn test_unreadable_target_fails() {
        let f = fixture("bot");
        let checkout = MemoryCheckout::new(&f.host, f.temp.path()).with_readable(false);
        let err = Remediator::new(&f.host, &checkout, &AutoApprove, RemediationSettings::default())
            .remediate(&f.template, &f.target)
            .unwrap_err();
        assert!(matches!(err, ConformError::PermissionDenied(_)));
    }

    #[test]
    fn test_existing_pull_request_is_updated() {
        let f = fixture("bot");
        f.host.set_permission(&f.target, "bot", Permission::Admin);
        run_with(&f, &AutoApprove).unwrap();

        // Second run against the same branch: files already pushed to the
        // branch are not in the host's file list, so they are staged again.
        let run = run_with(&f, &AutoApprove).unwrap();
        let Outcome::Done { updated, .. } = run.outcome else {
            panic!("expected done");
        };
        assert!(updated);
        assert_eq!(f.host.pull_requests(&f.target).len(), 1);
        assert_eq!(f.host.count_calls("edit_pull_request"), 1);
        assert_eq!(f.host.count_calls("create_branch"), 1);
    }

    #[test]
    fn test_compliant_target_aborts_without_side_effects() {
        let f = fixture("bot");
        for path in TEMPLATE_FILES {
            f.host.put_file(&f.target, path, b"present");
        }
        let operator = ScriptedOperator::new([]);
        let run = run_with(&f, &operator).unwrap();
        assert_eq!(run.outcome, Outcome::Aborted(AbortReason::Compliant));
        assert_eq!(run.states, vec![Idle, Aborted]);
        assert!(operator.asked().is_empty());
    }

    #[test]
    fn test_decline_before_staging_touches_nothing() {
        let f = fixture("bot");
        let operator = ScriptedOperator::new([Decision::Skip]);
        let run = run_with(&f, &operator).unwrap();
        assert_eq!(
            run.outcome,
            Outcome::Aborted(AbortReason::Declined(Gate::BeforeStaging))
        );
        assert_eq!(f.host.count_calls("authenticated_user"), 0);
        assert_eq!(f.host.count_calls("create_fork"), 0);
    }

    #[test]
    fn test_decline_before_push_cleans_up() {
        let f = fixture("bot");
        f.host.set_permission(&f.target, "bot", Permission::Write);
        let operator = ScriptedOperator::new([Decision::Proceed, Decision::Skip]);
        let run = run_with(&f, &operator).unwrap();

        assert_eq!(
            run.outcome,
            Outcome::Aborted(AbortReason::Declined(Gate::BeforePush))
        );
        assert_eq!(run.states, vec![Idle, PermissionChecked, BranchReady, Staged, Aborted]);
        assert!(f.host.pushes().is_empty());
        assert!(!f.temp.path().join("org").join("project").exists());
        assert_eq!(
            operator.asked(),
            vec![
                (Gate::BeforeStaging, f.target.clone()),
                (Gate::BeforePush, f.target.clone())
            ]
        );
    }

    #[test]
    fn test_pull_request_failure_keeps_pushed_branch() {
        let f = fixture("bot");
        f.host.set_permission(&f.target, "bot", Permission::Write);
        f.host.fail_operation("create_pull_request", "validation failed");
        let err = run_with(&f, &AutoApprove).unwrap_err();

        assert!(matches!(err, ConformError::CollaboratorFailure { .. }));
        assert_eq!(f.host.pushes().len(), 1);
        assert!(f.host.branch_sha(&f.target, DEFAULT_BRANCH).is_some());
        assert!(!f.temp.path().join("org").join("project").exists());
    }

    #[test]
    fn test_push_failure_opens_no_pull_request() {
        let f = fixture("bot");
        f.host.set_permission(&f.target, "bot", Permission::Write);
        let checkout = MemoryCheckout::new(&f.host, f.temp.path());
        checkout.fail_operation("commit_and_push", "rejected");
        let result = Remediator::new(&f.host, &checkout, &AutoApprove, RemediationSettings::default())
            .remediate(&f.template, &f.target);

        assert!(result.is_err());
        assert_eq!(f.host.count_calls("create_pull_request"), 0);
        assert_eq!(f.host.count_calls("list_pull_requests"), 0);
    }

    #[test]
    fn test_everything_already_staged_skips_commit() {
        let f = fixture("bot");
        f.host.set_permission(&f.target, "bot", Permission::Write);
        let slot = f.temp.path().join("org").join("project");
        std::fs::create_dir_all(slot.join(".github")).unwrap();
        std::fs::write(slot.join("LICENSE"), b"x").unwrap();
        std::fs::write(slot.join(".github/CODEOWNERS"), b"x").unwrap();

        let run = run_with(&f, &AutoApprove).unwrap();
        assert!(!run.states.contains(&CommitPushed));
        assert!(run.states.contains(&PullRequestOpen));
        assert!(f.host.pushes().is_empty());
    }
}
