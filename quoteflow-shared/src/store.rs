//! Failures reported by the backing store.
//!
//! The store only hands back diagnostic text. That text is classified exactly
//! once, when a [`StoreError`] is built, so orchestration code matches on
//! [`StoreErrorKind`] and never inspects messages itself.

use std::fmt;

/// Classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// Object is referenced by an in-flight query or background operation.
    /// Retryable.
    Busy,
    /// Object (or database) does not exist.
    NotFound,
    /// Object already exists. For ATTACH this means "already attached".
    AlreadyExists,
    /// Anything else, including transport failures.
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Busy => "busy",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Substrings of store diagnostics and the kind they map to.
///
/// Checked in order; the first match wins. Busy is listed first because a
/// busy diagnostic may also name a table that "exists".
const SIGNATURES: &[(&str, StoreErrorKind)] = &[
    ("still used by some query", StoreErrorKind::Busy),
    ("doesn't exist", StoreErrorKind::NotFound),
    ("does not exist", StoreErrorKind::NotFound),
    ("UNKNOWN_TABLE", StoreErrorKind::NotFound),
    ("already exists", StoreErrorKind::AlreadyExists),
    ("TABLE_ALREADY_EXISTS", StoreErrorKind::AlreadyExists),
];

/// Classify raw diagnostic text.
pub fn classify(message: &str) -> StoreErrorKind {
    SIGNATURES
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(StoreErrorKind::Other)
}

/// Error returned by an execution client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    /// Build from a store diagnostic, classifying it.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify(&message),
            message,
        }
    }

    /// Transport-level failure (connection refused, timeout, bad body).
    ///
    /// Never classified from its text: a transport error mentioning
    /// "does not exist" is still not a store answer.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Other,
            message: message.into(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.kind == StoreErrorKind::Busy
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == StoreErrorKind::AlreadyExists
    }
}
