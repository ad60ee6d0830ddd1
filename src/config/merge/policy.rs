//! Base layer of every merge: the built-in defaults.

use crate::config::ConformerConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// A builder whose lowest layer is `ConformerConfig::default()`, so every
/// key exists even when no file sets it.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&ConformerConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
