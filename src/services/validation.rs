//! Field rules shared by the auth and admin flows. Each check reports the first
//! violated rule for its field.

use crate::database::models::Gender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub type FieldResult<T = ()> = Result<T, FieldError>;

/// Trimmed and lowercased, the form emails are stored and looked up in
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn email(value: &str) -> FieldResult {
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(FieldError::new("email", "Please provide a valid email"))
    }
}

/// Names are required and at least two characters after trimming.
pub fn name(field: &'static str, label: &str, value: &str) -> FieldResult {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::new(field, format!("{} is required", label)));
    }
    if value.chars().count() < 2 {
        return Err(FieldError::new(field, format!("{} must be at least 2 characters", label)));
    }
    Ok(())
}

pub fn mobile(value: Option<&str>) -> FieldResult {
    match value {
        Some(v) if v.len() == 10 && v.bytes().all(|b| b.is_ascii_digit()) => Ok(()),
        _ => Err(FieldError::new("mobileNo", "Please provide a valid 10-digit mobile number")),
    }
}

pub fn gender(value: Option<&str>) -> FieldResult<Gender> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| FieldError::new("gender", "Please select a valid gender"))
}

/// Strength policy for passwords a user chooses themselves
pub fn password(field: &'static str, value: &str) -> FieldResult {
    if value.chars().count() < 6 {
        return Err(FieldError::new(field, "Password must be at least 6 characters"));
    }
    if !value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(FieldError::new(field, "Password must contain at least one uppercase letter"));
    }
    if !value.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(FieldError::new(field, "Password must contain at least one lowercase letter"));
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(FieldError::new(field, "Password must contain at least one digit"));
    }
    Ok(())
}

pub fn required(field: &'static str, message: &str, value: &str) -> FieldResult {
    if value.is_empty() {
        Err(FieldError::new(field, message))
    } else {
        Ok(())
    }
}
