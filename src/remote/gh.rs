//! GitHub CLI (`gh`) host adapter.
//!
//! Every call goes through `gh api`, so authentication is whatever
//! `gh auth login` set up; no token handling here.

use crate::error::{ConformError, Result};
use crate::remote::{ContentSource, DirectoryEntry, EntryKind, RepositoryHost};
use crate::tree::node::ContentHandle;
use crate::types::{BranchRef, Permission, PullRequest, RepoId, RepoSummary};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::Value;
use std::process::Command;
use tracing::debug;

#[derive(Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: EntryKind,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Deserialize)]
struct OwnerItem {
    login: String,
}

#[derive(Deserialize)]
struct RepoItem {
    name: String,
    owner: OwnerItem,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    archived: bool,
}

impl RepoItem {
    fn into_summary(self) -> RepoSummary {
        RepoSummary {
            id: RepoId::new(self.owner.login, self.name),
            default_branch: self.default_branch.unwrap_or_else(|| "main".to_string()),
            fork: self.fork,
            archived: self.archived,
        }
    }
}

#[derive(Deserialize)]
struct CommitItem {
    sha: String,
}

#[derive(Deserialize)]
struct BranchItem {
    name: String,
    commit: CommitItem,
}

#[derive(Deserialize)]
struct HeadItem {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Deserialize)]
struct PullItem {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    html_url: String,
    head: HeadItem,
}

impl PullItem {
    fn into_pull_request(self) -> PullRequest {
        let head_owner = self
            .head
            .label
            .as_deref()
            .and_then(|label| label.split_once(':'))
            .map(|(owner, _)| owner.to_string())
            .unwrap_or_default();
        PullRequest {
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            html_url: self.html_url,
            head_ref: self.head.git_ref,
            head_owner,
        }
    }
}

#[derive(Deserialize)]
struct PermissionItem {
    permission: String,
}

/// Host adapter that shells out to `gh api`.
pub struct GhHost {
    binary: String,
}

impl GhHost {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check that `gh` is installed and authenticated.
    pub fn check_auth(&self) -> Result<bool> {
        let output = Command::new(&self.binary).args(["auth", "status"]).output()?;
        Ok(output.status.success())
    }

    fn api(&self, args: &[&str]) -> Result<Vec<u8>> {
        let operation = format!("gh api {}", args.join(" "));
        debug!(%operation, "Calling hosting API");
        let output = Command::new(&self.binary)
            .arg("api")
            .args(args)
            .output()
            .map_err(|e| ConformError::collaborator(&operation, format!("failed to spawn: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(classify_failure(&operation, &stderr));
        }
        Ok(output.stdout)
    }

    fn api_json<T: for<'de> Deserialize<'de>>(&self, args: &[&str], what: &str) -> Result<T> {
        let bytes = self.api(args)?;
        serde_json::from_slice(&bytes).map_err(|e| ConformError::parse(what, e))
    }

    fn list_paginated<T: for<'de> Deserialize<'de>>(&self, endpoint: &str, what: &str) -> Result<Vec<T>> {
        let bytes = self.api(&["--paginate", endpoint])?;
        parse_paginated(&bytes, what)
    }
}

/// Map `gh api` stderr onto the error taxonomy.
pub fn classify_failure(operation: &str, stderr: &str) -> ConformError {
    let stderr = stderr.trim();
    let lower = stderr.to_lowercase();
    if lower.contains("http 404") || lower.contains("not found") {
        ConformError::LookupFailure(format!("{}: {}", operation, stderr))
    } else if lower.contains("rate limit") {
        ConformError::collaborator(operation, format!("rate limited: {}", stderr))
    } else if lower.contains("http 403") || lower.contains("must have") {
        ConformError::PermissionDenied(format!("{}: {}", operation, stderr))
    } else if lower.contains("http 401") || lower.contains("auth login") {
        ConformError::collaborator(
            operation,
            "not authenticated with GitHub; run 'gh auth login' first",
        )
    } else {
        ConformError::collaborator(operation, stderr)
    }
}

/// Everything outside RFC 3986 unreserved characters. Used for single path
/// segments and query values alike.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode each segment of a repository path, keeping the `/`
/// separators.
fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| utf8_percent_encode(segment, COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn contents_endpoint(repo: &RepoId, path: &str, git_ref: Option<&str>) -> String {
    let mut endpoint = format!("repos/{}/{}/contents/{}", repo.owner, repo.name, encode_path(path));
    if let Some(r) = git_ref {
        endpoint.push_str("?ref=");
        endpoint.push_str(&utf8_percent_encode(r, COMPONENT).to_string());
    }
    endpoint
}

/// Parse a contents API response. A path naming a file yields an object
/// rather than an array; both become a list.
pub fn parse_listing(repo: &RepoId, bytes: &[u8]) -> Result<Vec<DirectoryEntry>> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| ConformError::parse("listing", e))?;
    let items: Vec<ContentItem> = match value {
        Value::Array(_) => serde_json::from_value(value),
        other => serde_json::from_value(other).map(|item| vec![item]),
    }
    .map_err(|e| ConformError::parse("listing", e))?;

    Ok(items
        .into_iter()
        .map(|item| DirectoryEntry {
            content: ContentHandle {
                repo: repo.clone(),
                path: item.path.clone(),
                git_ref: None,
                download_url: item.download_url,
            },
            name: item.name,
            path: item.path,
            kind: item.kind,
            size: item.size,
            last_modified: None,
        })
        .collect())
}

/// Parse `--paginate` output: one JSON array per page, concatenated.
pub fn parse_paginated<T: for<'de> Deserialize<'de>>(bytes: &[u8], what: &str) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for page in serde_json::Deserializer::from_slice(bytes).into_iter::<Vec<T>>() {
        out.extend(page.map_err(|e| ConformError::parse(what, e))?);
    }
    Ok(out)
}

impl ContentSource for GhHost {
    fn fetch_content(&self, handle: &ContentHandle) -> Result<Vec<u8>> {
        let endpoint = contents_endpoint(&handle.repo, &handle.path, handle.git_ref.as_deref());
        self.api(&["-H", "Accept: application/vnd.github.raw+json", &endpoint])
    }
}

impl RepositoryHost for GhHost {
    fn list_directory(&self, repo: &RepoId, path: &str) -> Result<Vec<DirectoryEntry>> {
        let bytes = self.api(&[&contents_endpoint(repo, path, None)])?;
        parse_listing(repo, &bytes)
    }

    fn get_repository(&self, repo: &RepoId) -> Result<RepoSummary> {
        let item: RepoItem =
            self.api_json(&[&format!("repos/{}", repo.full_name())], "repository")?;
        Ok(item.into_summary())
    }

    fn get_default_branch(&self, repo: &RepoId) -> Result<BranchRef> {
        let summary = self.get_repository(repo)?;
        self.get_branch(repo, &summary.default_branch)
    }

    fn get_branch(&self, repo: &RepoId, name: &str) -> Result<BranchRef> {
        let item: BranchItem = self.api_json(
            &[&format!("repos/{}/branches/{}", repo.full_name(), name)],
            "branch",
        )?;
        Ok(BranchRef {
            repo: repo.clone(),
            name: item.name,
            sha: item.commit.sha,
        })
    }

    fn create_branch(&self, repo: &RepoId, name: &str, from_sha: &str) -> Result<BranchRef> {
        self.api(&[
            "-X",
            "POST",
            &format!("repos/{}/git/refs", repo.full_name()),
            "-f",
            &format!("ref=refs/heads/{}", name),
            "-f",
            &format!("sha={}", from_sha),
        ])?;
        Ok(BranchRef {
            repo: repo.clone(),
            name: name.to_string(),
            sha: from_sha.to_string(),
        })
    }

    fn create_fork(&self, repo: &RepoId) -> Result<RepoId> {
        let item: RepoItem = self.api_json(
            &["-X", "POST", &format!("repos/{}/forks", repo.full_name())],
            "fork",
        )?;
        Ok(item.into_summary().id)
    }

    fn list_pull_requests(&self, repo: &RepoId) -> Result<Vec<PullRequest>> {
        let items: Vec<PullItem> = self.list_paginated(
            &format!("repos/{}/pulls?state=open&per_page=100", repo.full_name()),
            "pull requests",
        )?;
        Ok(items.into_iter().map(PullItem::into_pull_request).collect())
    }

    fn create_pull_request(
        &self,
        repo: &RepoId,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest> {
        let item: PullItem = self.api_json(
            &[
                "-X",
                "POST",
                &format!("repos/{}/pulls", repo.full_name()),
                "-f",
                &format!("title={}", title),
                "-f",
                &format!("body={}", body),
                "-f",
                &format!("head={}", head),
                "-f",
                &format!("base={}", base),
            ],
            "pull request",
        )?;
        Ok(item.into_pull_request())
    }

    fn edit_pull_request(&self, repo: &RepoId, number: u64, title: &str, body: &str) -> Result<()> {
        self.api(&[
            "-X",
            "PATCH",
            &format!("repos/{}/pulls/{}", repo.full_name(), number),
            "-f",
            &format!("title={}", title),
            "-f",
            &format!("body={}", body),
        ])?;
        Ok(())
    }

    fn get_collaborator_permission(&self, repo: &RepoId, identity: &str) -> Result<Permission> {
        let item: PermissionItem = self.api_json(
            &[&format!(
                "repos/{}/collaborators/{}/permission",
                repo.full_name(),
                identity
            )],
            "permission",
        )?;
        item.permission.parse()
    }

    fn authenticated_user(&self) -> Result<String> {
        let item: OwnerItem = self.api_json(&["user"], "user")?;
        Ok(item.login)
    }

    fn list_repositories(&self, owner: &str) -> Result<Vec<RepoSummary>> {
        let items: Vec<RepoItem> =
            match self.list_paginated(&format!("orgs/{}/repos?per_page=100", owner), "repositories") {
                Ok(items) => items,
                Err(e) if e.is_lookup_failure() => {
                    debug!(owner, "Not an organization, listing user repositories");
                    self.list_paginated(&format!("users/{}/repos?per_page=100", owner), "repositories")?
                }
                Err(e) => return Err(e),
            };
        Ok(items.into_iter().map(RepoItem::into_summary).collect())
    }
}
