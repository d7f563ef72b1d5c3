//! IAM session lifecycle with refresh-token support.
//!
//! [`IamSession`] manages tokens for the IAM api-key variant, whose provider
//! also issues refresh tokens. Unlike [`TokenManager`](crate::TokenManager)
//! it never decodes claims: the provider response carries `expires_in` and
//! `expiration` directly, and the refresh deadline is derived from those.
//!
//! On each access the session decides, in strict order:
//! 1. hand out the caller-managed static token, if one is set;
//! 2. perform a full api-key exchange when nothing is cached or the cached
//!    refresh token has gone stale;
//! 3. perform a refresh-token exchange when only the access token is due;
//! 4. hand out the cached token otherwise.

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::claims::FRACTION_OF_TTL;
use crate::config::{ApiKeyCredential, ConfigError, StaticTokenCredential};
use crate::connector::Connector;
use crate::secret::Secret;
use crate::source::{self, ApiKeyTokenSource, RefreshTokenSource, TokenSource};
use crate::token::{TokenError, TokenRecord};

/// Safety buffer added to a record's expiration before its refresh token is
/// considered unusable. Providers keep refresh tokens alive for around 30
/// days; 7 days + 1 hour past the access-token expiration is well inside
/// that without hardcoding the provider's TTL.
const REFRESH_TOKEN_GRACE_SECS: i64 = 7 * 24 * 3600 + 3600;

enum Exchange {
    Reuse(Secret),
    Request,
    Refresh(Secret),
}

/// Token session for the IAM api-key variant.
pub struct IamSession<C: Connector> {
    connector: C,
    url: String,
    api_key: Option<Secret>,
    client_id: String,
    client_secret: Secret,
    disable_ssl_verification: bool,
    headers: Vec<(String, String)>,
    user_access_token: RwLock<Option<Secret>>,
    record: Mutex<Option<TokenRecord>>,
}

impl<C: Connector> IamSession<C> {
    /// Create a session for an api-key credential.
    pub fn new(credential: ApiKeyCredential, connector: C) -> Self {
        let (client_id, client_secret) = source::resolve_client_pair(
            credential.client_id.as_deref(),
            credential.client_secret.as_ref(),
        );
        Self {
            connector,
            url: credential.url,
            api_key: Some(credential.api_key),
            client_id,
            client_secret,
            disable_ssl_verification: credential.disable_ssl_verification,
            headers: credential.headers,
            user_access_token: RwLock::new(None),
            record: Mutex::new(None),
        }
    }

    /// Create a session that only ever hands out a caller-managed token.
    pub fn with_static_token(credential: StaticTokenCredential, connector: C) -> Self {
        Self {
            connector,
            url: crate::config::DEFAULT_IAM_URL.to_string(),
            api_key: None,
            client_id: source::DEFAULT_CLIENT_ID.to_string(),
            client_secret: Secret::new(source::DEFAULT_CLIENT_SECRET),
            disable_ssl_verification: false,
            headers: Vec::new(),
            user_access_token: RwLock::new(Some(credential.token)),
            record: Mutex::new(None),
        }
    }

    /// Return a usable access token, exchanging or refreshing first when the
    /// cached one is unusable.
    pub async fn get_token(&self) -> Result<Secret, TokenError> {
        let user_token = self.user_access_token.read().clone();
        if let Some(token) = user_token {
            // The caller owns this token's validity.
            return Ok(token);
        }

        let mut record = self.record.lock().await;
        let now = Utc::now().timestamp();
        let exchange = match record.as_ref() {
            None => Exchange::Request,
            Some(current) if refresh_token_stale(current, now) => Exchange::Request,
            Some(current) if past_refresh_deadline(current, now) => {
                match &current.refresh_token {
                    Some(refresh_token) => Exchange::Refresh(refresh_token.clone()),
                    None => Exchange::Request,
                }
            }
            Some(current) => Exchange::Reuse(current.access_token.clone()),
        };

        let fresh = match exchange {
            Exchange::Reuse(token) => {
                tracing::debug!("using cached access token");
                return Ok(token);
            }
            Exchange::Request => self.request_new_token().await?,
            Exchange::Refresh(refresh_token) => self.exchange_refresh_token(refresh_token).await?,
        };

        let token = fresh.access_token.clone();
        *record = Some(fresh);
        Ok(token)
    }

    /// Peek at the current token without running the lifecycle.
    pub async fn access_token(&self) -> Option<Secret> {
        let user_token = self.user_access_token.read().clone();
        if user_token.is_some() {
            return user_token;
        }
        let record = self.record.lock().await;
        record.as_ref().map(|current| current.access_token.clone())
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

    /// Replace the client id/secret pair used for the Basic authorization
    /// header. A half-missing pair falls back to the provider's public
    /// defaults, with a warning.
    pub fn set_authorization_info(
        &mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) {
        let id = client_id.into();
        let secret = Secret::new(client_secret.into());
        let (client_id, client_secret) = source::resolve_client_pair(
            (!id.is_empty()).then_some(id.as_str()),
            (!secret.expose().is_empty()).then_some(&secret),
        );
        self.client_id = client_id;
        self.client_secret = client_secret;
    }

    async fn request_new_token(&self) -> Result<TokenRecord, TokenError> {
        let Some(api_key) = &self.api_key else {
            return Err(TokenError::Config(ConfigError::MissingField {
                field: "apikey",
            }));
        };
        let source = ApiKeyTokenSource::from_parts(
            self.url.clone(),
            api_key.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
            self.disable_ssl_verification,
            self.headers.clone(),
        );
        source.request_token(&self.connector).await
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: Secret,
    ) -> Result<TokenRecord, TokenError> {
        let source = RefreshTokenSource::new(
            self.url.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
            refresh_token,
        )
        .with_disable_ssl_verification(self.disable_ssl_verification)
        .with_headers(self.headers.clone());
        source.request_token(&self.connector).await
    }
}

/// Whether the access token is past its refresh deadline,
/// `expiration - 0.2 * expires_in`. A record without the pair counts as due.
fn past_refresh_deadline(record: &TokenRecord, now: i64) -> bool {
    let (Some(expires_in), Some(expiration)) = (record.expires_in, record.expiration) else {
        return true;
    };
    let refresh_at = expiration as f64 - expires_in as f64 * (1.0 - FRACTION_OF_TTL);
    refresh_at < now as f64
}

/// Whether the refresh token associated with this record is past the point
/// where a refresh exchange is worth attempting.
fn refresh_token_stale(record: &TokenRecord, now: i64) -> bool {
    match record.expiration {
        Some(expiration) => expiration + REFRESH_TOKEN_GRACE_SECS < now,
        None => true,
    }
}
