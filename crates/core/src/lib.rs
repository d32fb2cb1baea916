//! Shared primitives for all Rust crates in otpdesk.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::PrincipalId;

/// Result type used across otpdesk crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string. Surrounding whitespace is trimmed.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
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

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operator-supplied secret material cannot be turned into a usable TOTP secret.
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    /// A one-time code could not be produced from otherwise accepted input.
    #[error("code generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// The mailbox session could not be opened or authenticated.
    #[error("mail connection failed: {0}")]
    MailConnect(String),

    /// The mailbox rejected or timed out a search or fetch.
    #[error("mail search failed: {0}")]
    MailSearch(String),

    /// A fetched message could not be decoded.
    #[error("mail parse failed: {0}")]
    MailParse(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but blocked by policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true for failures of the mailbox pipeline.
    #[must_use]
    pub fn is_mail_failure(&self) -> bool {
        matches!(
            self,
            Self::MailConnect(_) | Self::MailSearch(_) | Self::MailParse(_)
        )
    }
}
