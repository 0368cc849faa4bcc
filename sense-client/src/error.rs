//! Common error types for sense-client.
//!
//! This module provides a centralized Error enum using thiserror. The
//! variants separate the three things a caller needs to tell apart: a
//! missing or unusable session (log in again), a well-formed request the
//! server refused (inspect the status), and a transport failure from the
//! HTTP collaborator (passed through untouched).

use thiserror::Error;

/// Main error type for sense-client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No session, or the session's access token cannot be used.
    #[error("An attempt was made to access a resource without a valid session{}", detail_suffix(.0))]
    Unauthenticated(String),

    /// The server answered a well-formed request with a non-success status.
    #[error(
        "Failed to call the '{url}' Sense API endpoint. \
         The server responded with a status of {status} ({status_text})."
    )]
    Api {
        url: String,
        status: u16,
        status_text: String,
    },

    /// Failure inside the HTTP collaborator itself, passed through as-is
    #[error(transparent)]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    /// Response body did not have the expected shape
    #[error("Invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timestamp formatting errors
    #[error("Timestamp error: {0}")]
    Timestamp(#[from] time::error::Format),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

impl Error {
    pub(crate) fn unauthenticated(detail: impl Into<String>) -> Self {
        Error::Unauthenticated(detail.into())
    }

    pub(crate) fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Box::new(err))
    }

    /// HTTP status of an [`Error::Api`], if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Unauthenticated(_))
    }

    /// Whether retrying the same call later could succeed.
    ///
    /// True for transport failures, request timeouts, rate limiting and
    /// server-side errors. Authentication problems and other client errors
    /// need caller action first.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Api { status, .. } => {
                matches!(*status, 408 | 429) || (500..600).contains(status)
            }
            _ => false,
        }
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
