//! Token source strategies.
//!
//! A [`TokenSource`] knows how to build one credential-exchange request and
//! decode the provider's answer into a [`TokenRecord`]:
//! - [`ApiKeyTokenSource`] - IAM api-key grant
//! - [`RefreshTokenSource`] - IAM refresh-token grant
//! - [`PreauthTokenSource`] - CP4D preauth over basic auth
//!
//! Sources are stateless per call, perform exactly one exchange, and never
//! retry. Transport rejections come back as [`TokenError`] values rather
//! than panics.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{ApiKeyCredential, BasicAuthCredential};
use crate::connector::{Connector, ConnectorResponse, TokenRequest, basic_authorization};
use crate::secret::Secret;
use crate::token::{TokenError, TokenRecord};

/// Grant type marker of the IAM api-key exchange.
pub const GRANT_TYPE_APIKEY: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Grant type of the refresh-token exchange.
pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

/// Response type marker the IAM api-key grant requires.
pub const RESPONSE_TYPE_CLOUD_IAM: &str = "cloud_iam";

/// Preauth path appended to a CP4D deployment base URL.
const PREAUTH_PATH: &str = "/v1/preauth/validateAuth";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// The provider accepts this public pair for the api-key grant when a caller
// has no client credentials of their own.
pub(crate) const DEFAULT_CLIENT_ID: &str = "bx";
pub(crate) const DEFAULT_CLIENT_SECRET: &str = "bx";

const CLIENT_PAIR_WARNING: &str =
    "client id and client secret must both be given, or the provider's public defaults are used";

/// Resolve the client pair for the Basic authorization header, falling back
/// to the provider's public defaults when either half is missing.
pub(crate) fn resolve_client_pair(
    client_id: Option<&str>,
    client_secret: Option<&Secret>,
) -> (String, Secret) {
    match (client_id, client_secret) {
        (Some(id), Some(secret)) if !id.is_empty() && !secret.expose().is_empty() => {
            (id.to_string(), secret.clone())
        }
        _ => {
            tracing::warn!("{}", CLIENT_PAIR_WARNING);
            (
                DEFAULT_CLIENT_ID.to_string(),
                Secret::new(DEFAULT_CLIENT_SECRET),
            )
        }
    }
}

/// A pluggable credential-exchange strategy.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Perform one credential exchange through the given connector.
    async fn request_token(&self, connector: &dyn Connector) -> Result<TokenRecord, TokenError>;
}

/// IAM api-key grant: form-encoded POST carrying the api key, authorized
/// with a client id/secret Basic header.
pub struct ApiKeyTokenSource {
    url: String,
    api_key: Secret,
    client_id: String,
    client_secret: Secret,
    disable_ssl_verification: bool,
    headers: Vec<(String, String)>,
}

impl ApiKeyTokenSource {
    /// Build the source from a credential, resolving the client pair.
    pub fn new(credential: &ApiKeyCredential) -> Self {
        let (client_id, client_secret) = resolve_client_pair(
            credential.client_id.as_deref(),
            credential.client_secret.as_ref(),
        );
        Self {
            url: credential.url.clone(),
            api_key: credential.api_key.clone(),
            client_id,
            client_secret,
            disable_ssl_verification: credential.disable_ssl_verification,
            headers: credential.headers.clone(),
        }
    }

    /// Build the source from already-resolved parts. No fallback, no
    /// warning.
    pub(crate) fn from_parts(
        url: String,
        api_key: Secret,
        client_id: String,
        client_secret: Secret,
        disable_ssl_verification: bool,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            url,
            api_key,
            client_id,
            client_secret,
            disable_ssl_verification,
            headers,
        }
    }

    fn request(&self) -> TokenRequest {
        let mut request = TokenRequest::post(&self.url)
            .with_header("Content-type", FORM_CONTENT_TYPE)
            .with_header(
                "Authorization",
                basic_authorization(&self.client_id, self.client_secret.expose()),
            )
            .with_form_field("grant_type", GRANT_TYPE_APIKEY)
            .with_form_field("apikey", self.api_key.expose())
            .with_form_field("response_type", RESPONSE_TYPE_CLOUD_IAM)
            .with_disable_ssl_verification(self.disable_ssl_verification);
        for (name, value) in &self.headers {
            request = request.with_header(name, value);
        }
        request
    }
}

#[async_trait]
impl TokenSource for ApiKeyTokenSource {
    async fn request_token(&self, connector: &dyn Connector) -> Result<TokenRecord, TokenError> {
        let response = connector.send(self.request()).await?;
        parse_token_response(&response)
    }
}

/// IAM refresh-token grant, built per refresh around the cached refresh
/// token.
pub struct RefreshTokenSource {
    url: String,
    client_id: String,
    client_secret: Secret,
    refresh_token: Secret,
    disable_ssl_verification: bool,
    headers: Vec<(String, String)>,
}

impl RefreshTokenSource {
    /// Create a refresh exchange for the given token.
    pub fn new(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Secret,
        refresh_token: Secret,
    ) -> Self {
        Self {
            url: url.into(),
            client_id: client_id.into(),
            client_secret,
            refresh_token,
            disable_ssl_verification: false,
            headers: Vec::new(),
        }
    }

    /// Toggle TLS certificate verification for the exchange.
    pub fn with_disable_ssl_verification(mut self, disable: bool) -> Self {
        self.disable_ssl_verification = disable;
        self
    }

    /// Forward extra headers on the exchange.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    fn request(&self) -> TokenRequest {
        let mut request = TokenRequest::post(&self.url)
            .with_header("Content-type", FORM_CONTENT_TYPE)
            .with_header(
                "Authorization",
                basic_authorization(&self.client_id, self.client_secret.expose()),
            )
            .with_form_field("grant_type", GRANT_TYPE_REFRESH_TOKEN)
            .with_form_field("refresh_token", self.refresh_token.expose())
            .with_disable_ssl_verification(self.disable_ssl_verification);
        for (name, value) in &self.headers {
            request = request.with_header(name, value);
        }
        request
    }
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    async fn request_token(&self, connector: &dyn Connector) -> Result<TokenRecord, TokenError> {
        let response = connector.send(self.request()).await?;
        parse_token_response(&response)
    }
}

/// CP4D preauth: a GET against `<base-url>/v1/preauth/validateAuth` with a
/// username/password Basic header and no body.
pub struct PreauthTokenSource {
    url: String,
    username: String,
    password: Secret,
    disable_ssl_verification: bool,
    headers: Vec<(String, String)>,
}

impl PreauthTokenSource {
    /// Build the source from a credential; the preauth path is appended to
    /// the deployment base URL here.
    pub fn new(credential: &BasicAuthCredential) -> Self {
        let url = format!("{}{}", credential.url.trim_end_matches('/'), PREAUTH_PATH);
        Self {
            url,
            username: credential.username.clone(),
            password: credential.password.clone(),
            disable_ssl_verification: credential.disable_ssl_verification,
            headers: credential.headers.clone(),
        }
    }

    fn request(&self) -> TokenRequest {
        let mut request = TokenRequest::get(&self.url)
            .with_header("Content-type", FORM_CONTENT_TYPE)
            .with_header(
                "Authorization",
                basic_authorization(&self.username, self.password.expose()),
            )
            .with_disable_ssl_verification(self.disable_ssl_verification);
        for (name, value) in &self.headers {
            request = request.with_header(name, value);
        }
        request
    }
}

#[async_trait]
impl TokenSource for PreauthTokenSource {
    async fn request_token(&self, connector: &dyn Connector) -> Result<TokenRecord, TokenError> {
        let response = connector.send(self.request()).await?;
        parse_token_response(&response)
    }
}

/// Wire shape of a token response. Providers disagree on the spelling of
/// the access-token field, so both spellings are captured and merged in
/// [`RawTokenResponse::into_record`].
#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    #[serde(rename = "accessToken")]
    access_token_camel: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    expiration: Option<i64>,
    username: Option<String>,
    role: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
    sub: Option<String>,
    iss: Option<String>,
    aud: Option<String>,
    uid: Option<String>,
    #[serde(rename = "_messageCode_")]
    message_code: Option<String>,
    message: Option<String>,
}

impl RawTokenResponse {
    fn into_record(self) -> Result<TokenRecord, TokenError> {
        let access_token = self
            .access_token
            .or(self.access_token_camel)
            .filter(|token| !token.is_empty())
            .ok_or(TokenError::MissingAccessToken)?;
        Ok(TokenRecord {
            access_token: Secret::new(access_token),
            refresh_token: self.refresh_token.map(Secret::new),
            token_type: self.token_type,
            expires_in: self.expires_in,
            expiration: self.expiration,
            username: self.username,
            role: self.role,
            permissions: self.permissions,
            subject: self.sub,
            issuer: self.iss,
            audience: self.aud,
            uid: self.uid,
            message_code: self.message_code,
            message: self.message,
        })
    }
}

/// Decode a connector response into a token record.
pub(crate) fn parse_token_response(
    response: &ConnectorResponse,
) -> Result<TokenRecord, TokenError> {
    if !response.is_success() {
        return Err(TokenError::Transport {
            status: response.status,
            message: provider_message(&response.body),
        });
    }
    let raw: RawTokenResponse =
        serde_json::from_slice(&response.body).map_err(|error| TokenError::Transport {
            status: response.status,
            message: format!("malformed token response: {error}"),
        })?;
    raw.into_record()
}

/// Pull a human-readable message out of a provider error body.
fn provider_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["errorMessage", "message", "error_description", "errorCode"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        "no response body".to_string()
    } else {
        text.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(status: u16, body: serde_json::Value) -> ConnectorResponse {
        ConnectorResponse {
            status,
            headers: HashMap::new(),
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    #[test]
    fn test_parse_normalizes_snake_case_access_token() {
        let record = parse_token_response(&response(
            200,
            serde_json::json!({
                "access_token": "tok1",
                "refresh_token": "r1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "expiration": 1_000_000,
            }),
        ))
        .unwrap();

        assert_eq!(record.access_token.expose(), "tok1");
        assert_eq!(record.refresh_token.unwrap().expose(), "r1");
        assert_eq!(record.expires_in, Some(3600));
    }

    #[test]
    fn test_parse_normalizes_camel_case_access_token() {
        let record = parse_token_response(&response(
            200,
            serde_json::json!({
                "accessToken": "tok2",
                "username": "admin",
                "role": "Admin",
                "permissions": ["administrator", "can_provision"],
                "sub": "admin",
                "iss": "KNOXSSO",
                "aud": "DSX",
                "_messageCode_": "success",
                "message": "success",
            }),
        ))
        .unwrap();

        assert_eq!(record.access_token.expose(), "tok2");
        assert_eq!(record.username.as_deref(), Some("admin"));
        assert_eq!(record.permissions, vec!["administrator", "can_provision"]);
        assert_eq!(record.message_code.as_deref(), Some("success"));
    }

    #[test]
    fn test_parse_rejects_response_without_access_token() {
        let result = parse_token_response(&response(200, serde_json::json!({"token_type": "x"})));
        assert!(matches!(result, Err(TokenError::MissingAccessToken)));

        let result = parse_token_response(&response(200, serde_json::json!({"access_token": ""})));
        assert!(matches!(result, Err(TokenError::MissingAccessToken)));
    }

    #[test]
    fn test_parse_maps_rejection_with_provider_message() {
        let result = parse_token_response(&response(
            400,
            serde_json::json!({"errorMessage": "Provided API key could not be found"}),
        ));
        match result {
            Err(TokenError::Transport { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Provided API key could not be found");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_maps_malformed_success_body() {
        let malformed = ConnectorResponse {
            status: 200,
            headers: HashMap::new(),
            body: b"<html>gateway timeout</html>".to_vec(),
        };
        assert!(matches!(
            parse_token_response(&malformed),
            Err(TokenError::Transport { status: 200, .. })
        ));
    }

    #[test]
    fn test_resolve_client_pair_defaults_when_half_missing() {
        let secret = Secret::new("s");
        let (id, resolved) = resolve_client_pair(None, Some(&secret));
        assert_eq!(id, DEFAULT_CLIENT_ID);
        assert_eq!(resolved.expose(), DEFAULT_CLIENT_SECRET);

        let (id, resolved) = resolve_client_pair(Some("client"), Some(&secret));
        assert_eq!(id, "client");
        assert_eq!(resolved.expose(), "s");
    }

    #[test]
    fn test_api_key_request_shape() {
        let credential = ApiKeyCredential::new("my-key").unwrap();
        let source = ApiKeyTokenSource::new(&credential);
        let request = source.request();

        assert_eq!(request.method, crate::connector::HttpMethod::Post);
        assert!(
            request
                .headers
                .contains(&("Authorization".to_string(), "Basic Yng6Yng=".to_string()))
        );
        assert!(
            request
                .form
                .contains(&("grant_type".to_string(), GRANT_TYPE_APIKEY.to_string()))
        );
        assert!(
            request
                .form
                .contains(&("apikey".to_string(), "my-key".to_string()))
        );
        assert!(
            request
                .form
                .contains(&("response_type".to_string(), RESPONSE_TYPE_CLOUD_IAM.to_string()))
        );
    }

    #[test]
    fn test_preauth_request_shape() {
        let credential =
            BasicAuthCredential::new("user", "password", "https://cp4d.example.com/").unwrap();
        let source = PreauthTokenSource::new(&credential);
        let request = source.request();

        assert_eq!(request.method, crate::connector::HttpMethod::Get);
        assert_eq!(
            request.url,
            "https://cp4d.example.com/v1/preauth/validateAuth"
        );
        assert!(request.form.is_empty());
        assert!(
            request
                .headers
                .contains(&(
                    "Authorization".to_string(),
                    "Basic dXNlcjpwYXNzd29yZA==".to_string()
                ))
        );
    }
}
