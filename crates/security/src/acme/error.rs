//! ACME protocol errors.

use thiserror::Error;

/// Errors reported by an [`AcmeClient`](super::AcmeClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcmeError {
    /// The server answered with a problem document
    #[error("{problem_type}: {detail}")]
    Problem { problem_type: String, detail: String },

    /// The server could not be reached
    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    /// No ACME transport is configured
    #[error("no ACME client is configured")]
    Unavailable,

    /// A replacement account key could not be created
    #[error("account key generation failed: {0}")]
    KeyGeneration(String),
}

impl AcmeError {
    pub fn problem(problem_type: impl Into<String>, detail: impl Into<String>) -> Self {
        AcmeError::Problem {
            problem_type: problem_type.into(),
            detail: detail.into(),
        }
    }
}
