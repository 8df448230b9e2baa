//! Error taxonomy for the adaptation engine

use thiserror::Error;

/// Errors raised by the managed-system client, the validator and the
/// controller phases
#[derive(Debug, Error)]
pub enum AdaptationError {
    /// The managed system answered 404 for a required endpoint
    #[error("endpoint not reachable: {url}")]
    EndpointNotReachable { url: String },

    /// A document did not conform to its schema
    #[error("schema violation: {}", violations.join("; "))]
    SchemaViolation { violations: Vec<String> },

    /// The schema itself could not be compiled
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A monitor attempt that should be retried
    #[error("transient fetch failure: {0}")]
    TransientFetchFailure(String),

    /// Any other HTTP status >= 400
    #[error("remote failure ({status}): {body}")]
    RemoteFailure { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// A phase was invoked before its predecessor completed in this cycle
    #[error("{phase} cannot run before {requires} in the current cycle")]
    PhaseOutOfOrder {
        phase: &'static str,
        requires: &'static str,
    },

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("planning failed: {0}")]
    Planning(String),
}

impl AdaptationError {
    /// Build a schema violation for a single offending field
    pub fn violation(message: impl Into<String>) -> Self {
        AdaptationError::SchemaViolation {
            violations: vec![message.into()],
        }
    }

    /// True for errors that indicate a deployment problem rather than a
    /// per-cycle hiccup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdaptationError::EndpointNotReachable { .. } | AdaptationError::InvalidEndpoint(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AdaptationError>;
