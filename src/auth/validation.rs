use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{LoginRequest, RegisterRequest};
use crate::api::FieldError;

pub const USERNAME_MIN: usize = 5;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 8;
/// Width of the `users.email` column.
pub const EMAIL_MAX: usize = 100;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref STRICT_EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").unwrap();
    static ref DIGIT_RE: Regex = Regex::new(r"[0-9]").unwrap();
    static ref SYMBOL_RE: Regex = Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).unwrap();
}

/// Loose `local@domain.tld` shape check used for structural validation.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Stricter check applied to the trimmed email during registration.
pub fn is_strict_email(email: &str) -> bool {
    STRICT_EMAIL_RE.is_match(email)
}

/// Password rules applied in order; the first one broken is reported.
pub fn check_password_policy(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < PASSWORD_MIN {
        return Err("Password must be at least 8 characters long");
    }
    if !DIGIT_RE.is_match(password) {
        return Err("Password must contain at least one number");
    }
    if !SYMBOL_RE.is_match(password) {
        return Err("Password must contain at least one special character");
    }
    Ok(())
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if email.is_empty() {
        errors.push(FieldError::new("email", "email is required"));
    } else if !is_valid_email(email) {
        errors.push(FieldError::new("email", "invalid email format"));
    }
}

pub fn validate_register(req: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let username_len = req.username.chars().count();
    if req.username.is_empty() {
        errors.push(FieldError::new("username", "username is required"));
    } else if username_len < USERNAME_MIN {
        errors.push(FieldError::new(
            "username",
            format!("username must be at least {USERNAME_MIN} characters"),
        ));
    } else if username_len > USERNAME_MAX {
        errors.push(FieldError::new(
            "username",
            format!("username must not exceed {USERNAME_MAX} characters"),
        ));
    }

    check_email(&req.email, &mut errors);
    if req.email.chars().count() > EMAIL_MAX {
        errors.push(FieldError::new(
            "email",
            format!("email must not exceed {EMAIL_MAX} characters"),
        ));
    }

    if req.password.is_empty() {
        errors.push(FieldError::new("password", "password is required"));
    } else if req.password.chars().count() < PASSWORD_MIN {
        errors.push(FieldError::new(
            "password",
            format!("password must be at least {PASSWORD_MIN} characters"),
        ));
    }

    errors
}

pub fn validate_login(req: &LoginRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_email(&req.email, &mut errors);
    if req.password.is_empty() {
        errors.push(FieldError::new("password", "password is required"));
    }
    errors
}
