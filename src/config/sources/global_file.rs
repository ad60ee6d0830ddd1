//! Per-user configuration file; optional.

use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use std::path::Path;
use tracing::debug;

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: Option<&Path>,
) -> ConfigBuilder<DefaultState> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "Global config source");
            builder.add_source(File::from(path).format(FileFormat::Toml).required(false))
        }
        None => builder,
    }
}
