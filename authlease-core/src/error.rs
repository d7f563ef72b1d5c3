//! Top-level error type for authlease.

use thiserror::Error;

use crate::claims::ClaimsError;
use crate::config::ConfigError;
use crate::token::TokenError;

/// Top-level error type encompassing all authlease errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Error constructing a credential configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from the token lifecycle.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Error decoding token claims.
    #[error("claims error: {0}")]
    Claims(#[from] ClaimsError),
}
