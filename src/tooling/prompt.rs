//! Terminal confirmations for interactive remediation.

use crate::error::{ConformError, Result};
use crate::remediation::{Decision, Gate, Operator};
use crate::types::RepoId;
use dialoguer::Input;

/// Asks on the terminal at each gate. Answers follow
/// [`Decision::from_answer`]; an empty answer skips.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptOperator;

impl PromptOperator {
    fn question(gate: Gate, target: &RepoId) -> String {
        match gate {
            Gate::BeforeStaging => format!("Create PR for {}? (y/N/q)", target),
            Gate::BeforePush => format!("Push and open the PR on {}? (y/N/q)", target),
        }
    }

    fn input_error(e: dialoguer::Error) -> ConformError {
        ConformError::collaborator("prompt", format!("failed to read answer: {}", e))
    }
}

impl Operator for PromptOperator {
    fn confirm(&self, gate: Gate, target: &RepoId, summary: &str) -> Result<Decision> {
        eprintln!("{}", summary);
        let answer: String = Input::new()
            .with_prompt(Self::question(gate, target))
            .allow_empty(true)
            .interact_text()
            .map_err(Self::input_error)?;
        Ok(Decision::from_answer(&answer))
    }
}
