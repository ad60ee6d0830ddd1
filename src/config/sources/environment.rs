//! Environment variable source: `CONFORMER__` prefix with `__` separator.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, Map};

pub const PREFIX: &str = "CONFORMER";

/// Add the environment overlay. `vars` replaces the process environment
/// when given.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    vars: Option<Map<String, String>>,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(vars),
    )
}
