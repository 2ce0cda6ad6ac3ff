//! Access control: the shared token and basic-auth accounts.

use std::collections::HashMap;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::config::UserCredentials;

/// Length of generated access tokens.
pub const TOKEN_LENGTH: usize = 16;

/// Cookie that remembers a token login.
pub const TOKEN_COOKIE: &str = "token";

/// Generate a random alphanumeric access token.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// What a request may present to be let in.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    token: String,
    users: HashMap<String, String>,
}

impl AuthConfig {
    /// Accept `token`, plus any of `users` through basic auth.
    pub fn new(token: impl Into<String>, users: &[UserCredentials]) -> Self {
        Self {
            token: token.into(),
            users: users
                .iter()
                .map(|u| (u.username.clone(), u.password.clone()))
                .collect(),
        }
    }

    /// Use the configured token, or generate one.
    pub fn from_config(token: Option<&str>, users: &[UserCredentials]) -> Self {
        match token {
            Some(token) => Self::new(token, users),
            None => Self::new(generate_token(), users),
        }
    }

    /// The access token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether `candidate` is the access token.
    pub fn check_token(&self, candidate: &str) -> bool {
        candidate == self.token
    }

    /// Whether `username`/`password` is a configured account.
    pub fn check_user(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|expected| expected == password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<UserCredentials> {
        vec![UserCredentials {
            username: "alice".into(),
            password: "wonderland".into(),
        }]
    }

    #[test]
    fn test_generated_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_token(), token);
    }

    #[test]
    fn test_configured_token_is_used() {
        let auth = AuthConfig::from_config(Some("fixed"), &[]);
        assert_eq!(auth.token(), "fixed");
        assert!(auth.check_token("fixed"));
        assert!(!auth.check_token("Fixed"));
        assert!(!auth.check_token(""));
    }

    #[test]
    fn test_missing_token_is_generated() {
        let auth = AuthConfig::from_config(None, &[]);
        assert_eq!(auth.token().len(), TOKEN_LENGTH);
    }

    #[test]
    fn test_basic_credentials() {
        let auth = AuthConfig::new("t", &users());
        assert!(auth.check_user("alice", "wonderland"));
        assert!(!auth.check_user("alice", "wrong"));
        assert!(!auth.check_user("bob", "wonderland"));
    }
}
