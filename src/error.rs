//! Exchange error kinds.
//!
//! Every core component returns [`ExchangeError`]; the HTTP boundary maps
//! each kind onto its wire status code. Nothing is retried at the core.

use thiserror::Error;

/// Errors produced by the exchange core.
///
/// Each variant corresponds to exactly one wire status code, so the HTTP
/// boundary can translate mechanically (see `server::error_status`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Malformed or out-of-range input (400).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Missing, unknown or expired bearer token (401).
    #[error("unauthorized")]
    Unauthorized,

    /// Admission would push the owner's potential balance below the
    /// negated collateral limit (402).
    #[error("insufficient collateral")]
    InsufficientCollateral,

    /// Authenticated, but not the owner of the targeted resource (403).
    #[error("forbidden")]
    Forbidden,

    /// Unknown, terminal or out-of-scope resource (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The submission would have consumed the owner's own resting
    /// liquidity (412).
    #[error("self match")]
    SelfMatch,

    /// The contract's trading window has not opened yet (425).
    #[error("too early")]
    TooEarly,

    /// The contract's trading window has already closed (451).
    #[error("too late")]
    TooLate,

    /// State conflict, e.g. a username that is already taken (409).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ExchangeError {
    /// Convenience constructor for [`ExchangeError::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        ExchangeError::InvalidInput(message.into())
    }

    /// Stable kind name carried in error response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::InvalidInput(_) => "invalid_input",
            ExchangeError::Unauthorized => "unauthorized",
            ExchangeError::InsufficientCollateral => "insufficient_collateral",
            ExchangeError::Forbidden => "forbidden",
            ExchangeError::NotFound(_) => "not_found",
            ExchangeError::SelfMatch => "self_match",
            ExchangeError::TooEarly => "too_early",
            ExchangeError::TooLate => "too_late",
            ExchangeError::Conflict(_) => "conflict",
        }
    }
}
