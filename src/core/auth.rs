//! Authentication providers
//!
//! The local backend needs no credentials and always acts as the configured
//! operator. The HTTP backend sends a bearer token taken from configuration.

use serde::Serialize;
use thiserror::Error;

/// Operator name used when none is configured
pub const DEFAULT_OPERATOR: &str = "Fleet Operator";

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("not signed in: set api_token in the config file or FLEET_API_TOKEN")]
    MissingToken,
}

pub trait AuthProvider {
    /// The user the current session acts as
    fn current_user(&self) -> Result<User, AuthError>;

    /// Token for the `Authorization: Bearer` header, if any
    fn bearer_token(&self) -> Option<&str>;
}

/// Always authenticated as the configured operator
#[derive(Debug, Clone)]
pub struct LocalAuth {
    operator: String,
}

impl LocalAuth {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
        }
    }
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new(DEFAULT_OPERATOR)
    }
}

impl AuthProvider for LocalAuth {
    fn current_user(&self) -> Result<User, AuthError> {
        Ok(User {
            name: self.operator.clone(),
        })
    }

    fn bearer_token(&self) -> Option<&str> {
        None
    }
}

/// Authenticated only when a non-empty token is configured
#[derive(Debug, Clone)]
pub struct TokenAuth {
    operator: String,
    token: Option<String>,
}

impl TokenAuth {
    pub fn new(operator: impl Into<String>, token: Option<String>) -> Self {
        Self {
            operator: operator.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

impl AuthProvider for TokenAuth {
    fn current_user(&self) -> Result<User, AuthError> {
        match self.token {
            Some(_) => Ok(User {
                name: self.operator.clone(),
            }),
            None => Err(AuthError::MissingToken),
        }
    }

    fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
