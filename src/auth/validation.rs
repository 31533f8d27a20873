//! Login and sign-up form validation

use validator::{Validate, ValidationErrors};

/// Email/password login form.
#[derive(Debug, Clone, Default, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Account creation form.
#[derive(Debug, Clone, Default, Validate)]
pub struct SignupForm {
    #[validate(length(min = 2, message = "First name must be at least 2 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, message = "Last name must be at least 2 characters"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords must match"))]
    pub confirm_password: String,
}

/// Password reset request.
#[derive(Debug, Clone, Default, Validate)]
pub struct ResetPasswordForm {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

impl SignupForm {
    /// Display name stored on the profile document.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Required-field messages, checked before the format rules so an empty
/// field reports "is required" rather than a format error.
fn required(field: &'static str, value: &str, message: &'static str) -> Option<FieldError> {
    value.trim().is_empty().then(|| FieldError {
        field,
        message: message.to_string(),
    })
}

/// A single failed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Flatten validator output into (field, message) pairs, sorted by field so
/// the order is stable.
fn flatten(errors: ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            let field: &'static str = match field.as_ref() {
                "first_name" => "first_name",
                "last_name" => "last_name",
                "email" => "email",
                "password" => "password",
                "confirm_password" => "confirm_password",
                _ => return None,
            };
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", field));
            Some(FieldError { field, message })
        })
        .collect();
    out.sort_by_key(|e| e.field);
    out
}

impl LoginForm {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        let missing: Vec<FieldError> = [
            required("email", &self.email, "Email is required"),
            required("password", &self.password, "Password is required"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !missing.is_empty() {
            return Err(missing);
        }
        self.validate().map_err(flatten)
    }
}

impl SignupForm {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        let missing: Vec<FieldError> = [
            required("first_name", &self.first_name, "First name is required"),
            required("last_name", &self.last_name, "Last name is required"),
            required("email", &self.email, "Email is required"),
            required("password", &self.password, "Password is required"),
            required(
                "confirm_password",
                &self.confirm_password,
                "Please confirm your password",
            ),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !missing.is_empty() {
            return Err(missing);
        }
        self.validate().map_err(flatten)
    }
}

impl ResetPasswordForm {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        if let Some(missing) = required("email", &self.email, "Email is required") {
            return Err(vec![missing]);
        }
        self.validate().map_err(flatten)
    }
}

/// Join field errors into one line for an alert.
pub fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
