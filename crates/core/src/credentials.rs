//! Format rules for account handles and passwords.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Handles: 3-30 ASCII letters, digits, or underscores.
pub const HANDLE_PATTERN: &str = r"^[a-zA-Z0-9_]{3,30}$";

/// Passwords: 8-64 ASCII letters, digits, or `!@#$%^&*`.
pub const PASSWORD_PATTERN: &str = r"^[A-Za-z0-9!@#$%^&*]{8,64}$";

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(HANDLE_PATTERN).expect("valid regex"));

static PASSWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PASSWORD_PATTERN).expect("valid regex"));

pub fn validate_handle(handle: &str) -> Result<(), CoreError> {
    if HANDLE_RE.is_match(handle) {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "Handle must be 3-30 characters of letters, digits, or underscores".to_string(),
        ))
    }
}

pub fn validate_password(password: &str) -> Result<(), CoreError> {
    if PASSWORD_RE.is_match(password) {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "Password must be 8-64 characters of letters, digits, or !@#$%^&*".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_handles() {
        for handle in ["abc", "alice_01", "A_B_C", &"x".repeat(30)] {
            assert!(validate_handle(handle).is_ok(), "{handle} should be valid");
        }
    }

    #[test]
    fn rejects_invalid_handles() {
        for handle in ["", "ab", "has space", "dash-ed", "émile", &"x".repeat(31)] {
            assert!(validate_handle(handle).is_err(), "{handle} should be invalid");
        }
    }

    #[test]
    fn accepts_valid_passwords() {
        assert!(validate_password("password").is_ok());
        assert!(validate_password("P@ssw0rd!#").is_ok());
        assert!(validate_password(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn rejects_invalid_passwords() {
        assert!(validate_password("short1!").is_err());
        assert!(validate_password("with space1").is_err());
        assert!(validate_password("tilde~tilde").is_err());
        assert!(validate_password(&"a".repeat(65)).is_err());
    }
}
