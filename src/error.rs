//! Error types shared by the compliance pipeline and its collaborators.

use thiserror::Error;

/// Errors surfaced by tree building, staging, remediation, and the host adapters.
#[derive(Debug, Error)]
pub enum ConformError {
    /// A requested path, branch, or repository does not exist.
    #[error("Not found: {0}")]
    LookupFailure(String),

    /// The acting identity lacks the rights for the attempted operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Any other failure from the hosting API or a spawned tool
    /// (authentication, rate limiting, transport).
    #[error("Collaborator failure in {operation}: {message}")]
    CollaboratorFailure { operation: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Writing into the local working copy failed.
    #[error("Staging error: {0}")]
    StagingError(String),

    #[error("Structure is {depth} levels deep, display limit is {max}")]
    TooDeep { depth: usize, max: usize },

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConformError {
    pub fn collaborator(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ConformError::CollaboratorFailure {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn parse(what: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ConformError::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// True when the error only says the looked-up thing is absent.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, ConformError::LookupFailure(_))
    }
}

impl From<config::ConfigError> for ConformError {
    fn from(e: config::ConfigError) -> Self {
        ConformError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for ConformError {
    fn from(e: serde_json::Error) -> Self {
        ConformError::parse("JSON", e)
    }
}

pub type Result<T> = std::result::Result<T, ConformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_failure_detection() {
        assert!(ConformError::LookupFailure("repos/a/b".to_string()).is_lookup_failure());
        assert!(!ConformError::PermissionDenied("x".to_string()).is_lookup_failure());
    }

    #[test]
    fn test_collaborator_display_names_operation() {
        let err = ConformError::collaborator("gh api repos/a/b", "rate limit exceeded");
        assert_eq!(
            err.to_string(),
            "Collaborator failure in gh api repos/a/b: rate limit exceeded"
        );
    }
}
