//! # AppError
//!
//! Centralized error handling for the LitScope ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all ls-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Club, Thread, Comment)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Bad credentials or an unverified email at sign-in
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// Club operation attempted by a non-member
    #[error("not a member: {0}")]
    NotMember(String),

    /// Acting on another user's resource (edit/delete without authorship)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Join request from a user who already belongs to the club
    #[error("already a member: {0}")]
    AlreadyMember(String),

    /// Conditional update lost its version race too many times
    #[error("conflict: {0}")]
    Conflict(String),

    /// Validation failure (e.g., empty content, bad date string)
    #[error("validation error: {0}")]
    Validation(String),

    /// Infrastructure failure (store adapter, object store)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// A specialized Result type for LitScope logic.
pub type Result<T> = std::result::Result<T, AppError>;
