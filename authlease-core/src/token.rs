//! Token records and the token error taxonomy.
//!
//! A [`TokenRecord`] is produced by a token source from a provider response.
//! It is immutable once constructed and replaced wholesale by the lifecycle
//! on every successful fetch or refresh; a failed exchange never touches the
//! record that was cached before it.

use thiserror::Error;

use crate::config::ConfigError;
use crate::connector::ConnectorError;
use crate::secret::Secret;

/// A decoded provider token response.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    /// The bearer token, whichever field name the provider used for it.
    pub access_token: Secret,

    /// Refresh token, when the provider issues one.
    pub refresh_token: Option<Secret>,

    /// Token type, usually `Bearer`.
    pub token_type: Option<String>,

    /// Lifetime of the access token in seconds.
    pub expires_in: Option<i64>,

    /// Absolute expiry of the access token, epoch seconds.
    pub expiration: Option<i64>,

    /// Provider-side username.
    pub username: Option<String>,

    /// Provider-side role.
    pub role: Option<String>,

    /// Permissions granted to the authenticated identity.
    pub permissions: Vec<String>,

    /// Subject claim.
    pub subject: Option<String>,

    /// Issuer claim.
    pub issuer: Option<String>,

    /// Audience claim.
    pub audience: Option<String>,

    /// Provider-side user id.
    pub uid: Option<String>,

    /// Provider message code, when the response carries one.
    pub message_code: Option<String>,

    /// Provider message text.
    pub message: Option<String>,
}

impl TokenRecord {
    /// Create a record holding just an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: None,
            token_type: None,
            expires_in: None,
            expiration: None,
            username: None,
            role: None,
            permissions: Vec::new(),
            subject: None,
            issuer: None,
            audience: None,
            uid: None,
            message_code: None,
            message: None,
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Secret::new(refresh_token));
        self
    }

    /// Attach the lifetime/expiry pair IAM-style providers return.
    pub fn with_expiry(mut self, expires_in: i64, expiration: i64) -> Self {
        self.expires_in = Some(expires_in);
        self.expiration = Some(expiration);
        self
    }

    /// Attach a token type.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }
}

/// Error type for token lifecycle operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The credential configuration is unusable.
    #[error("invalid credential configuration: {0}")]
    Config(#[from] ConfigError),

    /// The provider rejected the exchange.
    #[error("token endpoint returned status {status}: {message}")]
    Transport {
        /// HTTP status of the rejection.
        status: u16,
        /// Message extracted from the provider's response body.
        message: String,
    },

    /// The request never reached the provider.
    #[error("token request could not be delivered: {message}")]
    Connection { message: String },

    /// The response carried no recognizable access-token field.
    #[error("no access token present in the provider response")]
    MissingAccessToken,
}

impl From<ConnectorError> for TokenError {
    fn from(error: ConnectorError) -> Self {
        Self::Connection {
            message: error.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = TokenRecord::new("tok")
            .with_refresh_token("r1")
            .with_expiry(3600, 1_000_000)
            .with_token_type("Bearer");

        assert_eq!(record.access_token.expose(), "tok");
        assert_eq!(record.refresh_token.unwrap().expose(), "r1");
        assert_eq!(record.expires_in, Some(3600));
        assert_eq!(record.expiration, Some(1_000_000));
        assert_eq!(record.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_record_debug_redacts_tokens() {
        let record = TokenRecord::new("very-secret").with_refresh_token("also-secret");
        let debug = format!("{record:?}");
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("also-secret"));
    }
}
