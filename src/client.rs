//! HTTP transport used by the emitter to deliver payloads.
//!
//! [`Transport`] is the seam between the emitter and the network. The
//! default implementation, [`HttpTransport`], wraps a pooled reqwest client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while talking to the ingestion endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request timeout
    #[error("Request timed out")]
    Timeout,

    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),
}

// The request URL carries the API key, so it is stripped before the error
// is turned into text.
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err.without_url().to_string())
        }
    }
}

/// Response received from the ingestion endpoint.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,

    /// Response body, or the error hit while reading it
    pub body: Result<String, TransportError>,
}

/// Something that can POST a JSON body to a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `body` to `url` with `Content-Type: application/json`.
    ///
    /// An `Err` means no HTTP response was received. Error statuses are
    /// returned as `Ok` and left to the caller.
    async fn post_json(
        &self,
        url: Url,
        body: Vec<u8>,
    ) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed [`Transport`].
///
/// The client is reused for every request so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport. With `timeout` unset, reqwest's default applies.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: Url,
        body: Vec<u8>,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, "Ingestion endpoint responded");

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.without_url().to_string()));

        Ok(TransportResponse { status, body })
    }
}
