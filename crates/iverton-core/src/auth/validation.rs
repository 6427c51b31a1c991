//! Form validation for sign-in and sign-up.

use iverton_types::auth::{Credentials, SignUpRequest};
use iverton_types::error::ValidationErrors;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Loose structural check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|part| !part.is_empty())
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.add("email", "Please enter a valid email address");
    }
}

pub fn validate_sign_in(credentials: &Credentials) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_email(&mut errors, &credentials.email);
    if credentials.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()
}

pub fn validate_sign_up(request: &SignUpRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if request.name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    check_email(&mut errors, &request.email);
    if request.password.is_empty() {
        errors.add("password", "Password is required");
    } else if request.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    if request.confirm_password != request.password {
        errors.add("confirmPassword", "Passwords do not match");
    }
    errors.into_result()
}
