//! Core identity types shared across the pipeline.

use crate::error::ConformError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Repository identity in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Browser URL of the repository on the given host (e.g. `https://github.com`).
    pub fn html_url(&self, web_url: &str) -> String {
        format!("{}/{}/{}", web_url.trim_end_matches('/'), self.owner, self.name)
    }

    /// Browser URL of the owning user or organization.
    pub fn owner_url(&self, web_url: &str) -> String {
        format!("{}/{}", web_url.trim_end_matches('/'), self.owner)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = ConformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, '/');
        match (parts.next(), parts.next()) {
            (Some(owner), Some(name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(RepoId::new(owner, name))
            }
            _ => Err(ConformError::ConfigError(format!(
                "Invalid repository '{}': expected owner/name",
                s
            ))),
        }
    }
}

/// A named ref on a specific repository, pinned to its tip commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub repo: RepoId,
    pub name: String,
    pub sha: String,
}

/// Summary of a hosted repository as returned by the hosting API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub id: RepoId,
    pub default_branch: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
}

/// Collaborator permission level of an identity on a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Admin,
    Maintain,
    Write,
    Triage,
    Read,
    None,
}

impl Permission {
    pub fn can_push(self) -> bool {
        matches!(
            self,
            Permission::Admin | Permission::Maintain | Permission::Write
        )
    }

    pub fn can_read(self) -> bool {
        !matches!(self, Permission::None)
    }
}

impl FromStr for Permission {
    type Err = ConformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Permission::Admin),
            "maintain" => Ok(Permission::Maintain),
            "write" | "push" => Ok(Permission::Write),
            "triage" => Ok(Permission::Triage),
            "read" | "pull" => Ok(Permission::Read),
            "none" => Ok(Permission::None),
            other => Err(ConformError::parse(
                "permission level",
                format!("unknown level '{}'", other),
            )),
        }
    }
}

/// Effective rights of the acting identity on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPermissions {
    pub push: bool,
    pub read: bool,
}

/// An open pull request on a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub html_url: String,
    /// Source branch name (without owner prefix).
    pub head_ref: String,
    /// Owner of the repository the source branch lives on.
    pub head_owner: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id_parse() {
        let id: RepoId = "octo/widgets".parse().unwrap();
        assert_eq!(id, RepoId::new("octo", "widgets"));
        assert_eq!(id.full_name(), "octo/widgets");
        assert!("octo".parse::<RepoId>().is_err());
        assert!("octo/a/b".parse::<RepoId>().is_err());
        assert!("/widgets".parse::<RepoId>().is_err());
    }

    #[test]
    fn test_repo_urls() {
        let id = RepoId::new("octo", "widgets");
        assert_eq!(
            id.html_url("https://github.com/"),
            "https://github.com/octo/widgets"
        );
        assert_eq!(id.owner_url("https://github.com"), "https://github.com/octo");
    }

    #[test]
    fn test_permission_levels() {
        assert!(Permission::Admin.can_push());
        assert!(Permission::Write.can_push());
        assert!(!Permission::Triage.can_push());
        assert!(Permission::Read.can_read());
        assert!(!Permission::None.can_read());
        assert_eq!("push".parse::<Permission>().unwrap(), Permission::Write);
        assert!("owner".parse::<Permission>().is_err());
    }
}
