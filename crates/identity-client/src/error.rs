//! Identity backend error types.

use thiserror::Error;

/// Error type for identity backend operations.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Missing or invalid bearer credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Backend rejected the input semantically (bad code, weak/duplicate credential)
    #[error("Rejected by backend: {0}")]
    ValidationRejected(String),

    /// Unexpected backend failure (5xx)
    #[error("Server error: {0}")]
    Server(String),

    /// No session is held by the client
    #[error("Not signed in")]
    NotSignedIn,

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IdentityError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Connection failures and timeouts
    /// - 5xx server errors
    pub fn is_transient(&self) -> bool {
        match self {
            IdentityError::Server(_) => true,
            IdentityError::Network(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                // Transport failed before a response was produced.
                e.status().is_none()
            }
            _ => false,
        }
    }

    /// Returns true if the error is an authorization failure.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, IdentityError::Unauthorized(_))
    }
}

/// Result type alias using IdentityError.
pub type IdentityResult<T> = Result<T, IdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_is_transient() {
        assert!(IdentityError::Server("boom".to_string()).is_transient());
    }

    #[test]
    fn test_validation_is_not_transient() {
        assert!(!IdentityError::ValidationRejected("bad code".to_string()).is_transient());
    }

    #[test]
    fn test_unauthorized_is_not_transient() {
        assert!(!IdentityError::Unauthorized("expired".to_string()).is_transient());
    }

    #[test]
    fn test_not_signed_in_is_not_transient() {
        assert!(!IdentityError::NotSignedIn.is_transient());
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(IdentityError::Unauthorized("no token".to_string()).is_unauthorized());
        assert!(!IdentityError::NotSignedIn.is_unauthorized());
    }
}
