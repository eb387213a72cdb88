//! Sign-in and sign-up form validation.
//!
//! Validation failures are resolved here, before any remote call is made.

use crate::error::{BarterError, Result};
use regex::Regex;
use std::sync::OnceLock;

const MIN_PASSWORD_LEN: usize = 6;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
    })
}

/// Validated e-mail/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Validates raw form input. The e-mail is trimmed; the password is not.
    pub fn parse(email: &str, password: &str) -> Result<Self> {
        let email = email.trim();
        if email.is_empty() {
            return Err(BarterError::validation("email", "is required"));
        }
        if !email_pattern().is_match(email) {
            return Err(BarterError::validation("email", "is not a valid address"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(BarterError::validation(
                "password",
                format!("must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        Ok(Self {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_credentials() {
        let creds = Credentials::parse("  ana@example.com ", "hunter22").unwrap();
        assert_eq!(creds.email(), "ana@example.com");
        assert_eq!(creds.password(), "hunter22");
    }

    #[test]
    fn test_rejects_bad_email() {
        let err = Credentials::parse("not-an-email", "hunter22").unwrap_err();
        assert!(matches!(err, BarterError::Validation { ref field, .. } if field == "email"));
    }

    #[test]
    fn test_rejects_short_password() {
        let err = Credentials::parse("ana@example.com", "abc").unwrap_err();
        assert!(matches!(err, BarterError::Validation { ref field, .. } if field == "password"));
    }
}
