//! Identity service: registered users, bearer tokens and collateral limits.
//!
//! The matching core consumes only token resolution and collateral lookups
//! from this service. Passwords are stored as salted SHA-256 digests; tokens
//! are opaque random strings minted at login and invalidated wholesale when
//! the user changes their password.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ExchangeError;

/// Per-user collateral limit.
///
/// `Unlimited` disables the exposure admission check entirely; a finite
/// limit `C` admits an order only while the owner's potential balance stays
/// at or above `-C`. Serializes as `-1` on the wire when unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Collateral {
    /// No limit (the default for new users).
    #[default]
    Unlimited,
    /// Finite non-negative limit.
    Limit(i64),
}

impl Collateral {
    /// Wire representation: finite limits as-is, unlimited as `-1`.
    pub fn wire_value(self) -> i64 {
        match self {
            Collateral::Unlimited => -1,
            Collateral::Limit(c) => c,
        }
    }
}

/// Source of collateral limits consumed by the order book's admission check.
pub trait CollateralSource {
    /// The collateral limit currently in force for `username`.
    fn collateral_limit(&self, username: &str) -> Collateral;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    username: String,
    salt: String,
    password_digest: String,
    collateral: Collateral,
}

/// Registered users and their active bearer tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityService {
    users: HashMap<String, User>,
    /// token -> username
    tokens: HashMap<String, String>,
}

impl IdentityService {
    /// An empty identity service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user.
    ///
    /// # Errors
    /// `InvalidInput` when username or password is empty; `Conflict` when
    /// the username is already taken.
    pub fn register(&mut self, username: &str, password: &str) -> Result<(), ExchangeError> {
        if username.is_empty() || password.is_empty() {
            return Err(ExchangeError::invalid("username and password required"));
        }
        if self.users.contains_key(username) {
            return Err(ExchangeError::Conflict(format!(
                "username {username} is already taken"
            )));
        }
        let salt = Uuid::new_v4().simple().to_string();
        let user = User {
            username: username.to_string(),
            password_digest: digest(&salt, password),
            salt,
            collateral: Collateral::Unlimited,
        };
        self.users.insert(username.to_string(), user);
        info!(username, "registered user");
        Ok(())
    }

    /// Verify credentials and mint a fresh bearer token.
    ///
    /// # Errors
    /// `Unauthorized` on unknown user or password mismatch.
    pub fn login(&mut self, username: &str, password: &str) -> Result<String, ExchangeError> {
        let user = self
            .users
            .get(username)
            .ok_or(ExchangeError::Unauthorized)?;
        if digest(&user.salt, password) != user.password_digest {
            return Err(ExchangeError::Unauthorized);
        }
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), username.to_string());
        debug!(username, "issued token");
        Ok(token)
    }

    /// Change a user's password, invalidating every outstanding token.
    ///
    /// # Errors
    /// `Unauthorized` on unknown user or old-password mismatch.
    pub fn change_password(
        &mut self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ExchangeError> {
        if new_password.is_empty() {
            return Err(ExchangeError::invalid("new password required"));
        }
        let user = self
            .users
            .get_mut(username)
            .ok_or(ExchangeError::Unauthorized)?;
        if digest(&user.salt, old_password) != user.password_digest {
            return Err(ExchangeError::Unauthorized);
        }
        user.salt = Uuid::new_v4().simple().to_string();
        user.password_digest = digest(&user.salt, new_password);
        self.tokens.retain(|_, owner| owner != username);
        info!(username, "password changed, tokens invalidated");
        Ok(())
    }

    /// Resolve a bearer token to its username, if the token is active.
    pub fn resolve_token(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }

    /// Whether a user with this name exists.
    pub fn user_exists(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    /// Set a finite collateral limit for a user.
    ///
    /// Takes effect for subsequent admissions only; resting orders are
    /// untouched.
    ///
    /// # Errors
    /// `InvalidInput` on a negative limit; `NotFound` on unknown user.
    pub fn set_collateral(&mut self, username: &str, limit: i64) -> Result<(), ExchangeError> {
        if limit < 0 {
            return Err(ExchangeError::invalid("collateral must be non-negative"));
        }
        let user = self
            .users
            .get_mut(username)
            .ok_or_else(|| ExchangeError::NotFound(format!("user {username}")))?;
        user.collateral = Collateral::Limit(limit);
        info!(username, limit, "collateral limit updated");
        Ok(())
    }
}

impl CollateralSource for IdentityService {
    fn collateral_limit(&self, username: &str) -> Collateral {
        self.users
            .get(username)
            .map(|u| u.collateral)
            .unwrap_or_default()
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
