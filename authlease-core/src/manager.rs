//! Claims-driven token lifecycle.
//!
//! [`TokenManager`] owns one cached [`TokenRecord`] and decides, on every
//! access, whether to hand out the cached token, perform a fresh credential
//! exchange, or return a caller-managed static token. The refresh deadline
//! comes from the `iat`/`exp` claims of the access token itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use authlease_core::{ApiKeyCredential, TokenManager};
//! use authlease_http::ReqwestConnector;
//!
//! let credential = ApiKeyCredential::new("my-api-key")?;
//! let manager = TokenManager::new(credential.into(), ReqwestConnector::new()?)?;
//!
//! // Before every outbound request:
//! let token = manager.get_token().await?;
//! ```

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::claims;
use crate::config::{ConfigError, CredentialConfig};
use crate::connector::Connector;
use crate::secret::Secret;
use crate::source::{ApiKeyTokenSource, PreauthTokenSource, TokenSource};
use crate::token::{TokenError, TokenRecord};

/// Token lifecycle engine over a pluggable [`TokenSource`].
///
/// The source of the token handed out by [`get_token`](Self::get_token) is
/// decided in strict order:
/// 1. a caller-managed static token, if one is set, returned as-is;
/// 2. a fresh credential exchange, if nothing is cached or the cached
///    record's refresh deadline has passed;
/// 3. the cached token otherwise.
///
/// Concurrent callers serialize on the decide-and-fetch sequence, so at most
/// one exchange is in flight per manager and a caller queued behind it
/// reuses the record that exchange produced.
pub struct TokenManager<C: Connector> {
    connector: C,
    source: Option<Box<dyn TokenSource>>,
    user_access_token: RwLock<Option<Secret>>,
    state: Mutex<LifecycleState>,
}

#[derive(Default)]
struct LifecycleState {
    record: Option<TokenRecord>,
    refresh_at: i64,
}

impl<C: Connector> TokenManager<C> {
    /// Create a manager for the given credential configuration.
    pub fn new(config: CredentialConfig, connector: C) -> Result<Self, ConfigError> {
        let (source, user_access_token): (Option<Box<dyn TokenSource>>, Option<Secret>) =
            match config {
                CredentialConfig::ApiKey(credential) => {
                    (Some(Box::new(ApiKeyTokenSource::new(&credential))), None)
                }
                CredentialConfig::BasicAuth(credential) => {
                    (Some(Box::new(PreauthTokenSource::new(&credential))), None)
                }
                CredentialConfig::StaticToken(credential) => (None, Some(credential.token)),
            };
        Ok(Self::from_parts(source, user_access_token, connector))
    }

    /// Create a manager around a custom token source.
    pub fn with_source(source: Box<dyn TokenSource>, connector: C) -> Self {
        Self::from_parts(Some(source), None, connector)
    }

    fn from_parts(
        source: Option<Box<dyn TokenSource>>,
        user_access_token: Option<Secret>,
        connector: C,
    ) -> Self {
        Self {
            connector,
            source,
            user_access_token: RwLock::new(user_access_token),
            state: Mutex::new(LifecycleState::default()),
        }
    }

    /// Return a usable access token, exchanging credentials first when the
    /// cached one is absent or due for refresh.
    pub async fn get_token(&self) -> Result<Secret, TokenError> {
        let user_token = self.user_access_token.read().clone();
        if let Some(token) = user_token {
            // The caller owns this token's validity.
            return Ok(token);
        }

        let mut state = self.state.lock().await;
        let now = Utc::now().timestamp();
        if state.record.is_none() || state.refresh_at < now {
            let Some(source) = self.source.as_deref() else {
                // Constructors guarantee a source whenever no static token
                // is configured.
                return Err(TokenError::Config(ConfigError::MissingField {
                    field: "token source",
                }));
            };
            let record = source.request_token(&self.connector).await?;
            state.refresh_at = refresh_at_for(&record);
            state.record = Some(record);
        } else {
            tracing::debug!("using cached access token");
        }

        match &state.record {
            Some(record) => Ok(record.access_token.clone()),
            None => Err(TokenError::MissingAccessToken),
        }
    }

    /// Peek at the current token without running the lifecycle.
    pub async fn access_token(&self) -> Option<Secret> {
        let user_token = self.user_access_token.read().clone();
        if user_token.is_some() {
            return user_token;
        }
        let state = self.state.lock().await;
        state.record.as_ref().map(|record| record.access_token.clone())
    }

    /// Whether a token is currently available without a fetch.
    pub async fn has_token(&self) -> bool {
        self.access_token().await.is_some()
    }

    /// Switch to a caller-managed access token.
    ///
    /// The token is handed out as-is from now on; the caller must replace it
    /// before it expires.
    pub fn set_access_token(&self, access_token: impl Into<String>) {
        *self.user_access_token.write() = Some(Secret::new(access_token));
    }
}

/// Decide when a record's replacement should be requested.
///
/// Undecodable claims are logged and treated as already due, which makes the
/// next access fetch a fresh token instead of failing the current one.
fn refresh_at_for(record: &TokenRecord) -> i64 {
    match claims::decode_unverified(record.access_token.expose()) {
        Ok(claims) => claims::refresh_deadline(&claims),
        Err(error) => {
            tracing::warn!(%error, "could not decode access token claims; next access will fetch a fresh token");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_at_for_undecodable_token_is_due_immediately() {
        let record = TokenRecord::new("opaque-token");
        assert_eq!(refresh_at_for(&record), 0);
    }
}
