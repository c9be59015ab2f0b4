use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }
}

/// Emails are compared and stored trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration input after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewAccount {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when a field is missing or the email
    /// is not shaped like `local@domain`.
    pub fn new(
        username: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, CoreError> {
        let username = username.map(str::trim).unwrap_or_default();
        let email = email.map(normalize_email).unwrap_or_default();
        let password = password.unwrap_or_default();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(CoreError::Validation(
                "Please provide username, email, and password".to_string(),
            ));
        }

        if !looks_like_email(&email) {
            return Err(CoreError::Validation(format!(
                "'{email}' is not a valid email address"
            )));
        }

        Ok(Self {
            username: username.to_string(),
            email,
            password: password.to_string(),
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn account_normalizes_email_and_username() {
        let account = NewAccount::new(Some(" asha "), Some(" Asha@Example.COM "), Some("pw"))
            .expect("valid account");
        assert_eq!(account.username, "asha");
        assert_eq!(account.email, "asha@example.com");
    }

    #[test]
    fn account_requires_every_field() {
        assert!(NewAccount::new(None, Some("a@b.c"), Some("pw")).is_err());
        assert!(NewAccount::new(Some("a"), Some("  "), Some("pw")).is_err());
        assert!(NewAccount::new(Some("a"), Some("a@b.c"), Some("")).is_err());
    }

    #[test]
    fn account_rejects_malformed_email() {
        for bad in ["plainaddress", "@example.com", "user@", "a@b@c", "a b@c.d"] {
            assert!(
                NewAccount::new(Some("user"), Some(bad), Some("pw")).is_err(),
                "expected '{bad}' to be rejected"
            );
        }
    }
}
