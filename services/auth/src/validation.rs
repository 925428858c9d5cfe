//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Validate a first or last name
pub fn validate_name(field: &str, value: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{} is required", field));
    }

    if value.chars().count() > 50 {
        return Err(format!("{} must be at most 50 characters long", field));
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Please provide a valid email".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

/// Validate a registration form, returning the first problem found
pub fn validate_registration(
    first_name: &str,
    last_name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
    agreed_to_privacy_policy: bool,
) -> Result<(), String> {
    validate_name("First name", first_name)?;
    validate_name("Last name", last_name)?;
    validate_email(email)?;
    validate_password(password)?;

    if password != confirm_password {
        return Err("Passwords do not match".to_string());
    }

    if !agreed_to_privacy_policy {
        return Err("You must agree to the privacy policy".to_string());
    }

    Ok(())
}
