//! Input validation for account and role fields.

use regex::Regex;

use crate::{AuthError, AuthResult};

pub fn validate_email(email: &str) -> AuthResult<()> {
    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map_err(|_| AuthError::Validation("invalid email pattern".into()))?;

    if email.len() > 255 || !email_regex.is_match(email) {
        return Err(AuthError::Validation("invalid email format".into()));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> AuthResult<()> {
    if username.len() < 3 || username.len() > 50 {
        return Err(AuthError::Validation(
            "username must be between 3 and 50 characters".into(),
        ));
    }

    let username_regex = Regex::new(r"^[a-zA-Z0-9_.-]+$")
        .map_err(|_| AuthError::Validation("invalid username pattern".into()))?;
    if !username_regex.is_match(username) {
        return Err(AuthError::Validation(
            "username can only contain letters, numbers, dots, underscores and hyphens".into(),
        ));
    }
    Ok(())
}

pub fn validate_role_name(name: &str) -> AuthResult<()> {
    let role_regex = Regex::new(r"^[a-z][a-z0-9_]{1,49}$")
        .map_err(|_| AuthError::Validation("invalid role pattern".into()))?;
    if !role_regex.is_match(name) {
        return Err(AuthError::Validation(
            "role names are 2-50 lowercase letters, digits or underscores".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("finance@fezalogistics.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("j.doe").is_ok());
        assert!(validate_username("jd").is_err());
        assert!(validate_username("has space").is_err());
    }

    #[test]
    fn test_validate_role_name() {
        assert!(validate_role_name("auditor").is_ok());
        assert!(validate_role_name("site_lead2").is_ok());
        assert!(validate_role_name("A").is_err());
        assert!(validate_role_name("has space").is_err());
    }
}
