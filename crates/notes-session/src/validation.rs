//! Registration form checks, run before anything is sent to the server.

use notes_auth::RegisterRequest;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least 8 characters")]
    PasswordTooShort,

    #[error("Please agree to the Terms of Service")]
    TermsNotAccepted,
}

/// Raw signup form input.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub accept_terms: bool,
}

/// Check the form in display order and build the request on success.
pub fn validate_registration(form: &RegistrationForm) -> Result<RegisterRequest, ValidationError> {
    if form.password != form.confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    if !form.accept_terms {
        return Err(ValidationError::TermsNotAccepted);
    }
    Ok(RegisterRequest {
        email: form.email.clone(),
        password: form.password.clone(),
        full_name: form.full_name.clone().filter(|n| !n.is_empty()),
        username: form.username.clone().filter(|n| !n.is_empty()),
    })
}
