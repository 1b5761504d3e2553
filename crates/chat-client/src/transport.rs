use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Everything needed for one provider round trip.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Raw provider response: status, headers, and the untouched body text.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    /// Case-insensitive header lookup; returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Best-effort JSON parse of the body. Parse failures degrade to `None`.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Faults raised below the protocol layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The effective cancellation token fired while the request was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// The client's own timeout fired while the request was in flight.
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
}

/// The seam between the client and the network.
///
/// Implementations issue exactly one POST and return the raw status and
/// body text without pre-parsing JSON; classification happens upstream.
/// Tests substitute this to run without a real endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> Result<RawResponse, TransportError>;
}

/// Default transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        let mut req = self.client.post(&request.url);
        for (name, value) in &request.headers {
            req = req.header(name, value);
        }

        let round_trip = async {
            let res = req.json(&request.body).send().await?;
            let status = res.status().as_u16();
            let headers = res
                .headers()
                .iter()
                .map(|(key, value)| {
                    (
                        key.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let body = res.text().await?;
            Ok(RawResponse {
                status,
                headers,
                body,
            })
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            outcome = round_trip => outcome,
        }
    }
}
