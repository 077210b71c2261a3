//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Validate a display name such as a first name, last name or role name
pub fn validate_name(field: &str, value: &str) -> Result<(), String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(format!("{} is required", field));
    }

    if value.chars().count() > 100 {
        return Err(format!("{} must be at most 100 characters long", field));
    }

    if value.chars().any(char::is_control) {
        return Err(format!("{} contains invalid characters", field));
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

    static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok());

    match regex {
        Some(regex) if regex.is_match(email) => Ok(()),
        Some(_) => Err("Invalid email format".to_string()),
        None => Err("Email validation is unavailable".to_string()),
    }
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_letter {
        return Err("Password must contain at least one letter".to_string());
    }

    if !has_digit {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn accepts_plain_addresses() {
        assert_ok!(validate_email("a@b.com"));
        assert_ok!(validate_email("first.last+tag@example.co"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_err!(validate_email(""));
        assert_err!(validate_email("no-at-sign"));
        assert_err!(validate_email("a@b"));
        assert_err!(validate_email(&format!("{}@b.com", "a".repeat(260))));
    }

    #[test]
    fn password_needs_length_letters_and_digits() {
        assert_ok!(validate_password("hunter2hunter"));
        assert_err!(validate_password("short1"));
        assert_err!(validate_password("onlyletters"));
        assert_err!(validate_password("1234567890"));
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_ok!(validate_name("Role name", "operators"));
        assert_eq!(
            validate_name("Role name", "   "),
            Err("Role name is required".to_string())
        );
        assert_err!(validate_name("First name", &"x".repeat(101)));
        assert_err!(validate_name("First name", "a\u{0007}b"));
    }
}
