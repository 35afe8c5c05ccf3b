//! Error taxonomy for pipeline orchestration.

use crate::store::StoreError;

/// Result alias used throughout quoteflow.
pub type QuoteflowResult<T> = Result<T, QuoteflowError>;

#[derive(Debug, thiserror::Error)]
pub enum QuoteflowError {
    /// The initial probe query failed. Nothing was attempted.
    #[error("cannot connect to store: {0}")]
    Connectivity(StoreError),

    /// A schema statement failed with a non-benign error.
    #[error("{label} failed: {source}")]
    SchemaOperation {
        label: String,
        #[source]
        source: StoreError,
    },

    /// Attach kept hitting the busy signature until attempts ran out.
    #[error("timed out waiting for ATTACH {object} after {attempts} attempts")]
    AttachTimeout { object: String, attempts: u32 },

    /// The rollup view could not be re-attached after a range delete.
    #[error("{object} not re-attached ({reason}); run manually: ATTACH TABLE {object}")]
    Reattach { object: String, reason: String },

    /// Rejected before any network call.
    #[error("invalid arguments: {0}")]
    Validation(String),

    /// The store answered with something that could not be interpreted.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl QuoteflowError {
    pub fn schema(label: impl Into<String>, source: StoreError) -> Self {
        Self::SchemaOperation {
            label: label.into(),
            source,
        }
    }

    /// Underlying store error, when there is one.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Connectivity(e) => Some(e),
            Self::SchemaOperation { source, .. } => Some(source),
            _ => None,
        }
    }
}
