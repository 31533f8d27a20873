//! Authentication error codes and their user-facing messages

use std::fmt;

use crate::error::GENERIC_ERROR_MESSAGE;

/// Hand-matched authentication failures. Anything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    UserNotFound,
    WrongPassword,
    InvalidCredential,
    InvalidEmail,
    UserDisabled,
    TooManyRequests,
    EmailAlreadyInUse,
    WeakPassword,
    Other,
}

impl AuthErrorCode {
    /// Map the identity endpoint's error message to a code.
    ///
    /// The endpoint reports e.g. `"WEAK_PASSWORD : Password should be at least
    /// 6 characters"`; only the leading token matters.
    pub fn from_native(native: &str) -> Self {
        let token = native
            .split(|c: char| c == ':' || c.is_whitespace())
            .next()
            .unwrap_or("");
        match token {
            "EMAIL_NOT_FOUND" => Self::UserNotFound,
            "INVALID_PASSWORD" => Self::WrongPassword,
            "INVALID_LOGIN_CREDENTIALS" => Self::InvalidCredential,
            "INVALID_EMAIL" => Self::InvalidEmail,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyRequests,
            "EMAIL_EXISTS" => Self::EmailAlreadyInUse,
            "WEAK_PASSWORD" => Self::WeakPassword,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserNotFound => "auth/user-not-found",
            Self::WrongPassword => "auth/wrong-password",
            Self::InvalidCredential => "auth/invalid-credential",
            Self::InvalidEmail => "auth/invalid-email",
            Self::UserDisabled => "auth/user-disabled",
            Self::TooManyRequests => "auth/too-many-requests",
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::WeakPassword => "auth/weak-password",
            Self::Other => "auth/unknown",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authentication failure: the mapped code plus the raw provider message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {native}")]
pub struct AuthError {
    pub code: AuthErrorCode,
    pub native: String,
}

impl AuthError {
    pub fn from_native(native: impl Into<String>) -> Self {
        let native = native.into();
        Self {
            code: AuthErrorCode::from_native(&native),
            native,
        }
    }

    /// Message shown on the login screen.
    pub fn sign_in_message(&self) -> &'static str {
        match self.code {
            AuthErrorCode::UserNotFound => "No account found with this email.",
            AuthErrorCode::WrongPassword => "Incorrect password.",
            AuthErrorCode::InvalidCredential => "Invalid email or password.",
            AuthErrorCode::InvalidEmail => "Invalid email format.",
            AuthErrorCode::UserDisabled => "This account has been disabled.",
            AuthErrorCode::TooManyRequests => "Too many failed attempts. Please try again later.",
            _ => GENERIC_ERROR_MESSAGE,
        }
    }

    /// Message shown on the sign-up screen.
    pub fn sign_up_message(&self) -> &'static str {
        match self.code {
            AuthErrorCode::EmailAlreadyInUse => {
                "Email already in use. Please use a different email."
            }
            AuthErrorCode::InvalidEmail => "Invalid email format. Please enter a valid email.",
            AuthErrorCode::WeakPassword => {
                "Password is too weak. Please choose a stronger password."
            }
            AuthErrorCode::TooManyRequests => "Too many failed attempts. Please try again later.",
            _ => GENERIC_ERROR_MESSAGE,
        }
    }
}
