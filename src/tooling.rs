//! Tooling & Integration Layer
//!
//! Command line front end: argument parsing, terminal prompts, and the
//! text/JSON rendering of results.

pub mod cli;
pub mod format;
pub mod prompt;

pub use cli::{run, Cli, CliContext, Commands, GhServices};
pub use prompt::PromptOperator;
