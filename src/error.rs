//! Uniform error type for every backend-facing operation.
//!
//! Each service call returns `ServiceResult<T>`: either the data payload or a
//! `ServiceError` carrying the backend's native error code. Nothing is retried;
//! callers surface the error once at the screen/command level.

use thiserror::Error;

use crate::auth::AuthError;

/// Fallback text for errors without a hand-matched message.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Authentication provider rejected the request.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Non-success response from the document store or auth endpoints.
    #[error("backend returned HTTP {status} ({code}): {message}")]
    Backend {
        status: u16,
        code: String,
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("not signed in")]
    NotSignedIn,

    /// Input rejected before reaching the backend.
    #[error("{0}")]
    Validation(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed value: {0}")]
    Malformed(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Native error code, as reported by the collaborator that failed.
    pub fn code(&self) -> &str {
        match self {
            Self::Auth(e) => e.code.as_str(),
            Self::Backend { code, .. } => code,
            Self::NotFound { .. } => "not-found",
            Self::NotSignedIn => "unauthenticated",
            Self::Validation(_) => "invalid-argument",
            Self::Transport(_) => "unavailable",
            Self::Decode(_) | Self::Malformed(_) => "data-loss",
        }
    }

    /// One-shot text to show the user.
    ///
    /// Validation messages are already user-facing; auth errors go through
    /// the hand-matched table; everything else gets the generic message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Auth(e) => e.sign_in_message().to_string(),
            Self::NotSignedIn => "You must be logged in.".to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthErrorCode;

    #[test]
    fn test_codes_carry_native_value() {
        let err = ServiceError::Backend {
            status: 403,
            code: "PERMISSION_DENIED".to_string(),
            message: "Missing or insufficient permissions.".to_string(),
        };
        assert_eq!(err.code(), "PERMISSION_DENIED");
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err = ServiceError::validation("Message cannot be empty");
        assert_eq!(err.user_message(), "Message cannot be empty");
        assert_eq!(err.code(), "invalid-argument");
    }

    #[test]
    fn test_auth_error_uses_table() {
        let err: ServiceError = AuthError::from_native("EMAIL_NOT_FOUND").into();
        assert_eq!(err.code(), AuthErrorCode::UserNotFound.as_str());
        assert_eq!(err.user_message(), "No account found with this email.");
    }
}
