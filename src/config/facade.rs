//! ConfigLoader facade over the merge service.

use super::merge::service::{MergeService, SourceSet};
use super::paths::xdg_root;
use super::ConformerConfig;
use crate::error::Result;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load with every standard layer, plus `explicit` when given.
    pub fn load(workspace_root: &Path, explicit: Option<&Path>) -> Result<ConformerConfig> {
        MergeService::load(&SourceSet {
            global: xdg_root::global_config_path().ok(),
            workspace_root: workspace_root.to_path_buf(),
            explicit: explicit.map(Path::to_path_buf),
            env: None,
        })
    }
}
