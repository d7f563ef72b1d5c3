//! Transport collaborator seam.
//!
//! The lifecycle never opens sockets or configures TLS. It shapes a
//! [`TokenRequest`] and interprets a [`ConnectorResponse`]; everything in
//! between belongs to a [`Connector`] implementation (see the
//! `authlease-http` crate for the reqwest-backed default).

use std::collections::HashMap;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;

/// HTTP method of a token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Plain GET, no body.
    Get,

    /// Form-encoded POST.
    Post,
}

/// A shaped token request, ready for a [`Connector`] to send.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    /// HTTP method.
    pub method: HttpMethod,

    /// Absolute endpoint URL.
    pub url: String,

    /// Header name/value pairs, in insertion order.
    pub headers: Vec<(String, String)>,

    /// Form body name/value pairs, unencoded. Encoding is the connector's
    /// job.
    pub form: Vec<(String, String)>,

    /// Skip TLS certificate verification for this request.
    pub disable_ssl_verification: bool,
}

impl TokenRequest {
    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Create a form-encoded POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            form: Vec::new(),
            disable_ssl_verification: false,
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a form body field.
    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    /// Toggle TLS certificate verification for this request.
    pub fn with_disable_ssl_verification(mut self, disable: bool) -> Self {
        self.disable_ssl_verification = disable;
        self
    }
}

/// The raw outcome of an HTTP exchange that produced a response, 2xx or not.
#[derive(Debug, Clone)]
pub struct ConnectorResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl ConnectorResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Connection-level failure: the request could not be delivered at all.
///
/// Provider-side rejections arrive as a [`ConnectorResponse`] with a non-2xx
/// status instead.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConnectorError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl ConnectorError {
    /// Create a new connector error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Abstraction over the HTTP transport used for token exchanges.
///
/// Implementations send exactly one request per call and deliver exactly one
/// outcome: a response or a failure, never both, never neither. No retries.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Send a token request and return the raw response.
    async fn send(&self, request: TokenRequest) -> Result<ConnectorResponse, ConnectorError>;
}

/// Build a `Basic` authorization header value from an id/secret pair.
pub fn basic_authorization(user: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{secret}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_authorization_encoding() {
        assert_eq!(basic_authorization("bx", "bx"), "Basic Yng6Yng=");
        assert_eq!(
            basic_authorization("user", "password"),
            "Basic dXNlcjpwYXNzd29yZA=="
        );
    }

    #[test]
    fn test_is_success_bounds() {
        let mut response = ConnectorResponse {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
        };
        assert!(response.is_success());
        response.status = 299;
        assert!(response.is_success());
        response.status = 300;
        assert!(!response.is_success());
        response.status = 199;
        assert!(!response.is_success());
    }

    #[test]
    fn test_request_builder_accumulates_fields() {
        let request = TokenRequest::post("https://iam.example.com/identity/token")
            .with_header("Content-type", "application/x-www-form-urlencoded")
            .with_form_field("grant_type", "refresh_token")
            .with_form_field("refresh_token", "r1");

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.headers.len(), 1);
        assert_eq!(
            request.form,
            vec![
                ("grant_type".to_string(), "refresh_token".to_string()),
                ("refresh_token".to_string(), "r1".to_string()),
            ]
        );
    }
}
