//! Error types for the promptdesk client core.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Client-side validation failures caught before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in all required fields")]
    MissingField(&'static str),

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Reasons a workspace switch is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchRejection {
    #[error("You do not have access to a company space")]
    NoCompanyAccess,

    #[error("You do not have access to any organizations")]
    NoOrganizations,

    #[error("Invalid organization selected")]
    UnknownOrganization(String),
}

/// The main error type.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ───────────────────────────────────────────────────────
    /// Backend rejected the credentials; carries its detail message verbatim.
    #[error("{0}")]
    InvalidCredentials(String),

    /// No session is available for an operation that needs one.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Pre-flight validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Workspace switch refused.
    #[error(transparent)]
    SwitchRejected(#[from] SwitchRejection),

    // ── API ──────────────────────────────────────────────────────────────────
    /// Any authenticated request answered with 401.
    #[error("Unauthorized")]
    Unauthorized,

    /// Backend returned a non-2xx response.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Detail message from the backend, or the raw body.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // ── Storage ──────────────────────────────────────────────────────────────
    /// Storage I/O error.
    #[error("Storage I/O error at {path}: {message}")]
    StorageIo {
        /// Path that caused the error.
        path: PathBuf,
        /// Error description.
        message: String,
    },

    /// Generic storage error (keyring, serialization of stored records).
    #[error("Storage error: {0}")]
    Storage(String),

    // ── Infrastructure ───────────────────────────────────────────────────────
    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a storage I/O error for a path.
    pub fn storage_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StorageIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error ends the current session.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::NotAuthenticated | Error::Unauthorized
                | Error::Api { status: 401, .. }
        )
    }

    /// Returns true for errors the user caused and can fix in the form.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InvalidCredentials(_) | Error::Validation(_) | Error::SwitchRejected(_)
        )
    }
}
