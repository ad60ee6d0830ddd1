//! MergeService: stacks the sources in precedence order and deserializes
//! the result into `ConformerConfig`.

use crate::config::sources::{environment, explicit_file, global_file, workspace_file};
use crate::config::ConformerConfig;
use crate::error::Result;
use config::Map;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::policy;

/// Where each layer comes from. `None` skips the global file or, for
/// `env`, reads the process environment.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub global: Option<PathBuf>,
    pub workspace_root: PathBuf,
    pub explicit: Option<PathBuf>,
    pub env: Option<Map<String, String>>,
}

pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> global file -> workspace file ->
    /// explicit file -> environment (highest).
    pub fn load(sources: &SourceSet) -> Result<ConformerConfig> {
        let builder = policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder, sources.global.as_deref());
        let builder = workspace_file::add_to_builder(builder, &sources.workspace_root);
        let builder = match sources.explicit.as_deref() {
            Some(path) => explicit_file::add_to_builder(builder, path),
            None => builder,
        };
        let builder = environment::add_to_builder(builder, sources.env.clone());

        let config: ConformerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(template = %config.template.repo(), "Configuration loaded");
        Ok(config)
    }

    /// Defaults, one file, and the environment; nothing else.
    pub fn load_from_file(path: &Path) -> Result<ConformerConfig> {
        let builder = policy::builder_with_defaults()?;
        let builder = explicit_file::add_to_builder(builder, path);
        let builder = environment::add_to_builder(builder, None);
        let config: ConformerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
