//! Errors raised by the shared building blocks.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure of a value constructor or an optimistic concurrency check.
///
/// Everything here is deterministic. Storage outages belong to the store
/// port, credential failures to the auth crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input, e.g. an email address without `@`.
    #[error("{0}")]
    Validation(String),

    /// An identifier that does not parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The record moved on since it was read.
    #[error("version conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
