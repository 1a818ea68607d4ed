//! Shared primitives for all Rust crates in Rolegate.

#![forbid(unsafe_code)]

/// Deployment namespace primitives.
pub mod deployment;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use deployment::DeploymentId;

/// Result type used across Rolegate crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No cached access rule grants the requested account and role.
    #[error("no matching access rule: {0}")]
    NoMatchingAccessRule(String),

    /// Remote authority call failed or returned an unusable response.
    #[error("remote error: {0}")]
    Remote(String),

    /// Local cache storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// One or more access rules failed to synchronize.
    #[error("sync incomplete: {0}")]
    SyncIncomplete(String),

    /// Work was abandoned because cancellation was requested.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
