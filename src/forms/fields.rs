//! Field-level cleaning shared by the account forms.

use regex::Regex;
use std::sync::OnceLock;

use super::REQUIRED;
use crate::identity::IdentityShape;

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("Invalid regex"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("Invalid regex")
    })
}

fn max_length_error(max: usize, actual: usize) -> String {
    format!("Ensure this value has at most {max} characters (it has {actual}).")
}

fn check_max_length(shape: &IdentityShape, field: &str, value: &str) -> Result<(), String> {
    let Some(max) = shape.field(field).and_then(|f| f.max_length) else {
        return Ok(());
    };
    let len = value.chars().count();
    if len > max {
        return Err(max_length_error(max, len));
    }
    Ok(())
}

/// Expects an already-normalized handle.
pub fn clean_username(shape: &IdentityShape, username: &str) -> Result<String, Vec<String>> {
    if username.is_empty() {
        return Err(vec![REQUIRED.to_string()]);
    }

    let mut errors = Vec::new();
    if let Err(e) = check_max_length(shape, "username", username) {
        errors.push(e);
    }
    if !username_regex().is_match(username) {
        errors.push(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }

    if errors.is_empty() {
        Ok(username.to_string())
    } else {
        Err(errors)
    }
}

/// Email is optional; an empty value is accepted as-is.
pub fn clean_email(shape: &IdentityShape, email: &str) -> Result<String, Vec<String>> {
    if email.is_empty() {
        return Ok(String::new());
    }

    let mut errors = Vec::new();
    if let Err(e) = check_max_length(shape, "email", email) {
        errors.push(e);
    }
    if !email_regex().is_match(email) {
        errors.push("Enter a valid email address.".to_string());
    }

    if errors.is_empty() {
        Ok(email.to_string())
    } else {
        Err(errors)
    }
}

pub fn clean_name(shape: &IdentityShape, field: &str, value: &str) -> Result<String, Vec<String>> {
    let value = value.trim();
    check_max_length(shape, field, value).map_err(|e| vec![e])?;
    Ok(value.to_string())
}
