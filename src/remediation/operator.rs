//! Operator confirmation port.

use crate::error::Result;
use crate::types::RepoId;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Points in the workflow where the operator is asked to confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// After the diff is known, before any branch, fork, or staging work.
    BeforeStaging,
    /// After files are staged, before the commit is pushed.
    BeforePush,
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::BeforeStaging => write!(f, "before staging"),
            Gate::BeforePush => write!(f, "before push"),
        }
    }
}

/// Operator answer at a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    /// Leave this target alone.
    Skip,
    /// Leave this target alone and stop processing further targets.
    Quit,
}

impl Decision {
    /// Map a typed answer: `y`/`yes` proceed, `q`/`quit`/`exit` quit,
    /// anything else skips.
    pub fn from_answer(answer: &str) -> Self {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Decision::Proceed,
            "q" | "quit" | "exit" => Decision::Quit,
            _ => Decision::Skip,
        }
    }
}

/// Source of confirmations for the remediation workflow.
pub trait Operator {
    /// `summary` is a human readable description of what happens next.
    fn confirm(&self, gate: Gate, target: &RepoId, summary: &str) -> Result<Decision>;
}

/// Operator that proceeds at every gate (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl Operator for AutoApprove {
    fn confirm(&self, _gate: Gate, _target: &RepoId, _summary: &str) -> Result<Decision> {
        Ok(Decision::Proceed)
    }
}

/// Operator that replays canned decisions and records each question.
/// Once the script runs out every gate is answered with `Skip`.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: Mutex<VecDeque<Decision>>,
    asked: Mutex<Vec<(Gate, RepoId)>>,
}

impl ScriptedOperator {
    pub fn new(answers: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<(Gate, RepoId)> {
        self.asked.lock().clone()
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&self, gate: Gate, target: &RepoId, _summary: &str) -> Result<Decision> {
        self.asked.lock().push((gate, target.clone()));
        Ok(self.answers.lock().pop_front().unwrap_or(Decision::Skip))
    }
}
