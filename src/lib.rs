//! Conformer: template compliance for hosted git repositories.
//!
//! A reference ("template") repository defines which files every repository
//! should carry. Conformer compares candidate repositories against it,
//! reports what is missing, and opens pull requests adding the missing
//! files, forking the target when the acting identity cannot push to it.

pub mod compliance;
pub mod config;
pub mod error;
pub mod logging;
pub mod remediation;
pub mod remote;
pub mod stage;
pub mod template;
pub mod tooling;
pub mod tree;
pub mod types;

pub use compliance::ComplianceReport;
pub use error::{ConformError, Result};
pub use template::{Template, TemplateRegistry};
pub use types::RepoId;
