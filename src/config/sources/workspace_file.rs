//! `conformer.toml` in the working directory; optional.

use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use std::path::Path;

pub const FILE_NAME: &str = "conformer.toml";

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        File::from(workspace_root.join(FILE_NAME))
            .format(FileFormat::Toml)
            .required(false),
    )
}
