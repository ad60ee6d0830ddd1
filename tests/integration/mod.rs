//! Integration tests for the conformer pipeline and command line

mod cli_commands;
mod cli_parse;
mod compliance_pipeline;
mod support;
