//! # Authlease HTTP
//!
//! The default transport collaborator for `authlease-core`:
//! [`ReqwestConnector`] implements the core's `Connector` trait on top of
//! [`reqwest`].
//!
//! The connector owns no policy. It sends exactly one request per call,
//! returns whatever response the server produced (2xx or not), and maps
//! connection-level failures to `ConnectorError`. Retries, backoff, and
//! timeouts belong to the caller or to the reqwest client configuration.

use async_trait::async_trait;

use authlease_core::{Connector, ConnectorError, ConnectorResponse, HttpMethod, TokenRequest};

/// [`Connector`] implementation backed by [`reqwest`].
///
/// Two clients are held: a verifying one and one that accepts invalid TLS
/// certificates. Which one serves a request is chosen per request via its
/// `disable_ssl_verification` flag, mirroring the toggle on the credential
/// configuration.
pub struct ReqwestConnector {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
}

impl ReqwestConnector {
    /// Build a connector with default reqwest clients.
    pub fn new() -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| ConnectorError::new(error.to_string()))?;
        let insecure_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|error| ConnectorError::new(error.to_string()))?;
        Ok(Self {
            client,
            insecure_client,
        })
    }
}

#[async_trait]
impl Connector for ReqwestConnector {
    async fn send(&self, request: TokenRequest) -> Result<ConnectorResponse, ConnectorError> {
        let client = if request.disable_ssl_verification {
            &self.insecure_client
        } else {
            &self.client
        };

        let mut builder = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| ConnectorError::new(error.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|text| (name.to_string(), text.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|error| ConnectorError::new(error.to_string()))?
            .to_vec();

        Ok(ConnectorResponse {
            status,
            headers,
            body,
        })
    }
}
