//! Pre-flight checks run before any sign-up request leaves the client.

use crate::error::ValidationError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Validate the three sign-up fields.
pub fn validate_sign_up(email: &str, password: &str, name: &str) -> Result<(), ValidationError> {
    for (field, value) in [("email", email), ("password", password), ("name", name)] {
        if value.trim().is_empty() {
            return Err(ValidationError::MissingField(field));
        }
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Sign-up form as entered, including the confirmation field.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    /// Required fields, then confirmation, then length.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("email", &self.email),
            ("password", &self.password),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        validate_sign_up(&self.email, &self.password, &self.name)
    }
}
