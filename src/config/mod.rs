//! Configuration
//!
//! Layered with the `config` crate, lowest precedence first: built-in
//! defaults, `$XDG_CONFIG_HOME/conformer/config.toml`, `conformer.toml` in
//! the working directory, an explicit `--config` file, and `CONFORMER__*`
//! environment variables (`__` separates nesting, e.g.
//! `CONFORMER__TEMPLATE__OWNER`).

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::error::{ConformError, Result};
use crate::logging::LoggingConfig;
use crate::remediation::{
    RemediationSettings, DEFAULT_ATTRIBUTION_NAME, DEFAULT_ATTRIBUTION_URL, DEFAULT_BRANCH,
    DEFAULT_COMMIT_MESSAGE, DEFAULT_PR_TITLE, DEFAULT_WEB_URL,
};
use crate::types::RepoId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fully merged configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConformerConfig {
    #[serde(default)]
    pub template: TemplateSection,
    #[serde(default)]
    pub remediation: RemediationSection,
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reference repository every target is compared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSection {
    pub owner: String,
    pub name: String,
    /// `template show` refuses structures nested deeper than this.
    pub max_display_depth: usize,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            owner: "AlabamaWaterInstitute".to_string(),
            name: "awi-open-source-project-template".to_string(),
            max_display_depth: 4,
        }
    }
}

impl TemplateSection {
    pub fn repo(&self) -> RepoId {
        RepoId::new(self.owner.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationSection {
    pub branch: String,
    pub commit_message: String,
    pub pr_title: String,
    /// Root of local checkouts; relative paths resolve against the working
    /// directory.
    pub clone_dir: PathBuf,
    pub attribution_name: String,
    pub attribution_url: String,
}

impl Default for RemediationSection {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            pr_title: DEFAULT_PR_TITLE.to_string(),
            clone_dir: PathBuf::from("clones"),
            attribution_name: DEFAULT_ATTRIBUTION_NAME.to_string(),
            attribution_url: DEFAULT_ATTRIBUTION_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSection {
    /// Browser base URL used for links in pull request bodies.
    pub web_url: String,
    pub gh_binary: String,
    pub git_binary: String,
    /// Memoize read calls for the duration of one command.
    pub cache: bool,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            web_url: DEFAULT_WEB_URL.to_string(),
            gh_binary: "gh".to_string(),
            git_binary: "git".to_string(),
            cache: true,
        }
    }
}

impl ConformerConfig {
    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("template.owner", &self.template.owner),
            ("template.name", &self.template.name),
            ("remediation.branch", &self.remediation.branch),
            ("remediation.commit_message", &self.remediation.commit_message),
            ("remediation.pr_title", &self.remediation.pr_title),
            ("host.gh_binary", &self.host.gh_binary),
            ("host.git_binary", &self.host.git_binary),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConformError::ConfigError(format!("{} must not be empty", key)));
            }
        }
        if self.remediation.clone_dir.as_os_str().is_empty() {
            return Err(ConformError::ConfigError(
                "remediation.clone_dir must not be empty".to_string(),
            ));
        }
        if !self.host.web_url.starts_with("http://") && !self.host.web_url.starts_with("https://") {
            return Err(ConformError::ConfigError(format!(
                "host.web_url must be an http(s) URL, got '{}'",
                self.host.web_url
            )));
        }
        Ok(())
    }

    pub fn remediation_settings(&self) -> RemediationSettings {
        RemediationSettings {
            branch: self.remediation.branch.clone(),
            commit_message: self.remediation.commit_message.clone(),
            pr_title: self.remediation.pr_title.clone(),
            attribution_name: self.remediation.attribution_name.clone(),
            attribution_url: self.remediation.attribution_url.clone(),
            web_url: self.host.web_url.clone(),
        }
    }

    /// Absolute checkout root, resolving a relative `clone_dir` against
    /// `workspace_root`.
    pub fn clone_root(&self, workspace_root: &Path) -> Result<PathBuf> {
        let dir = &self.remediation.clone_dir;
        if dir.is_absolute() {
            return Ok(dir.clone());
        }
        let base = dunce::canonicalize(workspace_root).map_err(|e| {
            ConformError::ConfigError(format!(
                "Failed to resolve working directory {}: {}",
                workspace_root.display(),
                e
            ))
        })?;
        Ok(base.join(dir))
    }

    /// The merged configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConformError::parse("configuration", e))
    }
}
