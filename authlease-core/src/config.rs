//! Credential configuration.
//!
//! This module defines the immutable inputs describing how to authenticate:
//! - [`ApiKeyCredential`] - IAM api-key exchange against a token endpoint
//! - [`BasicAuthCredential`] - CP4D username/password preauth
//! - [`StaticTokenCredential`] - a caller-managed bearer token
//! - [`CredentialConfig`] - enum over the three variants
//!
//! All string fields are validated at construction. A field that begins or
//! ends with a curly bracket or a quote is almost always a pasted JSON
//! fragment, so construction fails immediately instead of producing a
//! credential that can never authenticate.

use thiserror::Error;
use url::Url;

use crate::secret::Secret;

/// Public IAM token endpoint used when no explicit endpoint is configured.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// Username that marks a username/password pair as an api key in disguise.
const APIKEY_AS_USERNAME: &str = "apikey";

/// Api keys with this prefix belong to on-prem deployments and authenticate
/// with basic auth rather than the IAM exchange.
const ICP_PREFIX: &str = "icp-";

/// Error type for credential construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field starts or ends with `{`, `}`, or `"`.
    #[error(
        "the {field} must not start or end with curly brackets or quotes; \
         remove any {{}} and \" characters surrounding the value"
    )]
    BadFieldDelimiter { field: &'static str },

    /// A field required by the chosen variant is absent or empty.
    #[error("`{field}` is a required parameter for this credential variant")]
    MissingField { field: &'static str },

    /// An endpoint URL could not be parsed or uses an unsupported scheme.
    #[error("invalid endpoint url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
}

fn check_field(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let is_delimiter = |c: char| matches!(c, '{' | '}' | '"');
    if value.starts_with(is_delimiter) || value.ends_with(is_delimiter) {
        return Err(ConfigError::BadFieldDelimiter { field });
    }
    Ok(())
}

fn require_field(field: &'static str, value: String) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    check_field(field, &value)?;
    Ok(value)
}

fn require_endpoint(field: &'static str, value: String) -> Result<String, ConfigError> {
    let value = require_field(field, value)?;
    let parsed = Url::parse(&value).map_err(|error| ConfigError::InvalidUrl {
        url: value.clone(),
        message: error.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: value,
            message: format!("unsupported scheme `{}`", parsed.scheme()),
        });
    }
    Ok(value)
}

/// Credential for the IAM api-key grant.
///
/// # Example
///
/// ```rust,no_run
/// use authlease_core::ApiKeyCredential;
///
/// # fn main() -> Result<(), authlease_core::ConfigError> {
/// let credential = ApiKeyCredential::new("my-api-key")?
///     .with_client_pair("my-client", "my-secret")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiKeyCredential {
    /// The IAM api key.
    pub api_key: Secret,

    /// Client id for the Basic authorization header, if the caller has one.
    pub client_id: Option<String>,

    /// Client secret paired with `client_id`.
    pub client_secret: Option<Secret>,

    /// Token endpoint. Defaults to [`DEFAULT_IAM_URL`].
    pub url: String,

    /// Skip TLS certificate verification on token requests.
    pub disable_ssl_verification: bool,

    /// Extra headers forwarded on every token request.
    pub headers: Vec<(String, String)>,
}

impl ApiKeyCredential {
    /// Create a credential for the given api key, targeting the public IAM
    /// endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = require_field("apikey", api_key.into())?;
        Ok(Self {
            api_key: Secret::new(api_key),
            client_id: None,
            client_secret: None,
            url: DEFAULT_IAM_URL.to_string(),
            disable_ssl_verification: false,
            headers: Vec::new(),
        })
    }

    /// Override the token endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        self.url = require_endpoint("url", url.into())?;
        Ok(self)
    }

    /// Supply the client id/secret pair used for the Basic authorization
    /// header. Without a pair the provider's documented public defaults are
    /// used at request time.
    pub fn with_client_pair(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        self.client_id = Some(require_field("client id", client_id.into())?);
        self.client_secret = Some(Secret::new(require_field(
            "client secret",
            client_secret.into(),
        )?));
        Ok(self)
    }

    /// Toggle TLS certificate verification for token requests.
    pub fn with_disable_ssl_verification(mut self, disable: bool) -> Self {
        self.disable_ssl_verification = disable;
        self
    }

    /// Add a header to send on every token request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Credential for the CP4D preauth exchange.
#[derive(Debug, Clone)]
pub struct BasicAuthCredential {
    /// The user name.
    pub username: String,

    /// The password.
    pub password: Secret,

    /// Base URL of the deployment; the preauth path is appended at request
    /// time.
    pub url: String,

    /// Skip TLS certificate verification on token requests.
    pub disable_ssl_verification: bool,

    /// Extra headers forwarded on every token request.
    pub headers: Vec<(String, String)>,
}

impl BasicAuthCredential {
    /// Create a credential from a username/password pair and the deployment
    /// base URL. The URL is required for this variant.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            username: require_field("username", username.into())?,
            password: Secret::new(require_field("password", password.into())?),
            url: require_endpoint("url", url.into())?,
            disable_ssl_verification: false,
            headers: Vec::new(),
        })
    }

    /// Toggle TLS certificate verification for token requests.
    pub fn with_disable_ssl_verification(mut self, disable: bool) -> Self {
        self.disable_ssl_verification = disable;
        self
    }

    /// Add a header to send on every token request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A caller-managed bearer token.
///
/// The caller owns the token's validity; the lifecycle never refreshes it.
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    /// The bearer token to hand out verbatim.
    pub token: Secret,
}

impl StaticTokenCredential {
    /// Wrap a caller-managed token.
    pub fn new(token: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            token: Secret::new(require_field("access token", token.into())?),
        })
    }
}

/// How to authenticate: one of the three credential variants.
#[derive(Debug, Clone)]
pub enum CredentialConfig {
    /// IAM api-key exchange.
    ApiKey(ApiKeyCredential),

    /// CP4D username/password preauth.
    BasicAuth(BasicAuthCredential),

    /// Caller-managed token.
    StaticToken(StaticTokenCredential),
}

impl CredentialConfig {
    /// Interpret a username/password pair the way hosted services hand them
    /// out: the literal username `"apikey"` with a password not prefixed
    /// `icp-` is really an IAM api key.
    ///
    /// `url` names the deployment the pair belongs to; only the basic-auth
    /// form needs it for the preauth exchange.
    pub fn from_username_password(
        username: impl Into<String>,
        password: impl Into<String>,
        url: &str,
    ) -> Result<Self, ConfigError> {
        let username = username.into();
        let password = password.into();
        if username == APIKEY_AS_USERNAME && !password.starts_with(ICP_PREFIX) {
            Ok(Self::ApiKey(ApiKeyCredential::new(password)?))
        } else {
            Ok(Self::BasicAuth(BasicAuthCredential::new(
                username, password, url,
            )?))
        }
    }

    /// Interpret a bare api key: keys prefixed `icp-` belong to on-prem
    /// deployments and turn into a basic-auth credential with the literal
    /// `"apikey"` username against `url`.
    pub fn from_api_key(api_key: impl Into<String>, url: &str) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.starts_with(ICP_PREFIX) {
            Ok(Self::BasicAuth(BasicAuthCredential::new(
                APIKEY_AS_USERNAME,
                api_key,
                url,
            )?))
        } else {
            Ok(Self::ApiKey(ApiKeyCredential::new(api_key)?))
        }
    }
}

impl From<ApiKeyCredential> for CredentialConfig {
    fn from(credential: ApiKeyCredential) -> Self {
        Self::ApiKey(credential)
    }
}

impl From<BasicAuthCredential> for CredentialConfig {
    fn from(credential: BasicAuthCredential) -> Self {
        Self::BasicAuth(credential)
    }
}

impl From<StaticTokenCredential> for CredentialConfig {
    fn from(credential: StaticTokenCredential) -> Self {
        Self::StaticToken(credential)
    }
}
