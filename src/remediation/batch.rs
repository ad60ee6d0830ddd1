//! Owner-wide modes: read-only scans and batch remediation.

use crate::compliance::{evaluate, ComplianceReport};
use crate::error::Result;
use crate::remediation::{AbortReason, Outcome, Remediator};
use crate::remote::RepositoryHost;
use crate::template::Template;
use crate::types::{RepoId, RepoSummary};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Compliance of one repository in a scan. `error` is set when the
/// repository could not be evaluated.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub repo: RepoId,
    pub report: Option<ComplianceReport>,
    pub error: Option<String>,
}

/// How one target of a batch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Compliant,
    /// Archived repositories cannot receive pull requests.
    Archived,
    Remediated { url: String, updated: bool, files: usize },
    Aborted { reason: AbortReason },
    Failed { cause: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub repo: RepoId,
    pub missing: usize,
    #[serde(flatten)]
    pub status: BatchStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
    /// True when the operator stopped the batch early.
    pub quit: bool,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, BatchStatus::Failed { .. }))
    }
}

/// Repositories of `owner` other than the template itself, in listing order.
fn candidates(host: &dyn RepositoryHost, template: &Template, owner: &str) -> Result<Vec<RepoSummary>> {
    let mut repos = host.list_repositories(owner)?;
    repos.retain(|r| &r.id != template.repo());
    debug!(owner, count = repos.len(), "Listed candidate repositories");
    Ok(repos)
}

/// Evaluate every repository of `owner` without changing anything.
pub fn scan(host: &dyn RepositoryHost, template: &Template, owner: &str) -> Result<Vec<ScanEntry>> {
    let entries = candidates(host, template, owner)?
        .into_iter()
        .map(|summary| match evaluate(host, &summary.id, template) {
            Ok(report) => ScanEntry {
                repo: summary.id,
                report: Some(report),
                error: None,
            },
            Err(e) => {
                warn!(repo = %summary.id, error = %e, "Failed to evaluate repository");
                ScanEntry {
                    repo: summary.id,
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();
    Ok(entries)
}

impl Remediator<'_> {
    /// Remediate every non-compliant repository of `owner`, one at a time.
    ///
    /// A failing target is recorded and the batch moves on. Only a failure
    /// to list the owner's repositories fails the batch as a whole.
    pub fn remediate_batch(&self, template: &Template, owner: &str) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for summary in candidates(self.host, template, owner)? {
            let repo = summary.id.clone();
            if summary.archived {
                debug!(repo = %repo, "Skipping archived repository");
                report.entries.push(BatchEntry {
                    repo,
                    missing: 0,
                    status: BatchStatus::Archived,
                });
                continue;
            }

            let compliance = match evaluate(self.host, &repo, template) {
                Ok(c) => c,
                Err(e) => {
                    warn!(repo = %repo, error = %e, "Failed to evaluate repository");
                    report.entries.push(BatchEntry {
                        repo,
                        missing: 0,
                        status: BatchStatus::Failed {
                            cause: e.to_string(),
                        },
                    });
                    continue;
                }
            };
            let missing = compliance.missing_count;
            if compliance.is_compliant() {
                report.entries.push(BatchEntry {
                    repo,
                    missing,
                    status: BatchStatus::Compliant,
                });
                continue;
            }

            let status = match self.remediate_report(template, compliance) {
                Ok(run) => match run.outcome {
                    Outcome::Done {
                        pull_request,
                        updated,
                        written,
                    } => BatchStatus::Remediated {
                        url: pull_request.html_url,
                        updated,
                        files: written.len(),
                    },
                    Outcome::Aborted(reason) => BatchStatus::Aborted { reason },
                },
                Err(e) => {
                    warn!(repo = %repo, error = %e, "Remediation failed, continuing");
                    BatchStatus::Failed {
                        cause: e.to_string(),
                    }
                }
            };
            let quit = status
                == BatchStatus::Aborted {
                    reason: AbortReason::Quit,
                };
            report.entries.push(BatchEntry {
                repo,
                missing,
                status,
            });
            if quit {
                info!(owner, "Batch stopped by operator");
                report.quit = true;
                break;
            }
        }
        Ok(report)
    }
}
