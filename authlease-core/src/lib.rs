//! # Authlease Core
//!
//! Core library for bearer-token lifecycle management.
//!
//! This crate provides:
//! - Credential configurations for the supported authentication variants
//! - Token source strategies that perform one credential exchange each
//! - Lifecycle managers that cache tokens and schedule refreshes at 80% of
//!   the token's lifetime
//! - A transport seam ([`Connector`]) so the crate never touches sockets;
//!   `authlease-http` ships the reqwest-backed default
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use authlease_core::{ApiKeyCredential, TokenManager};
//! use authlease_http::ReqwestConnector;
//!
//! let credential = ApiKeyCredential::new("my-api-key")?;
//! let manager = TokenManager::new(credential.into(), ReqwestConnector::new()?)?;
//! let token = manager.get_token().await?;
//! // Attach `token.expose()` as a bearer token to outbound requests.
//! ```

pub mod claims;
pub mod config;
pub mod connector;
pub mod error;
pub mod manager;
pub mod secret;
pub mod session;
pub mod source;
pub mod token;

// Re-export commonly used types at crate root
pub use claims::{ClaimsError, TokenClaims, decode_unverified, refresh_deadline};

pub use config::{
    ApiKeyCredential, BasicAuthCredential, ConfigError, CredentialConfig, DEFAULT_IAM_URL,
    StaticTokenCredential,
};

pub use connector::{
    Connector, ConnectorError, ConnectorResponse, HttpMethod, TokenRequest, basic_authorization,
};

pub use error::AuthError;

pub use manager::TokenManager;

pub use secret::Secret;

pub use session::IamSession;

pub use source::{
    ApiKeyTokenSource, GRANT_TYPE_APIKEY, GRANT_TYPE_REFRESH_TOKEN, PreauthTokenSource,
    RESPONSE_TYPE_CLOUD_IAM, RefreshTokenSource, TokenSource,
};

pub use token::{TokenError, TokenRecord};
