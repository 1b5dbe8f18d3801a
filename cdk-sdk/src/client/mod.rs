//! Outbound CloudEvents HTTP client.
//!
//! Sources use [`CeClient`] to push events at a sink. Only compiled with the
//! `client` feature; a receiver that just decodes events can leave it off.

use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

use crate::binding::{self, BATCH_CONTENT_TYPE};
use crate::objects::{CloudEvent, DeliveryStatus, EventError};

/// Errors produced by [`CeClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The event could not be encoded.
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// The receiver answered with a non-2xx status.
    #[error("delivery failed with status {status}: {message} (code {code})")]
    Delivery {
        status: StatusCode,
        code: i32,
        message: String,
    },
}

/// Sends CloudEvents to a fixed target over HTTP.
///
/// Single events go out in binary content mode, slices in batched mode.
/// The client never retries; a failed delivery is returned to the caller.
#[derive(Debug, Clone)]
pub struct CeClient {
    http: Client,
    target: Url,
}

impl CeClient {
    const TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a client that delivers to `target`.
    pub fn new(target: Url) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self { http, target })
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Deliver one event to the configured target.
    pub async fn send(&self, event: &CloudEvent) -> Result<(), ClientError> {
        self.send_to(self.target.clone(), event).await
    }

    /// Deliver one event to an explicit URL.
    pub async fn send_to(&self, url: Url, event: &CloudEvent) -> Result<(), ClientError> {
        event.validate()?;
        let message = binding::encode_binary(event);

        let mut request = self.http.post(url);
        for (name, value) in &message.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let resp = request.body(message.body).send().await?;

        check_response(resp).await
    }

    /// Deliver several events in one batched request.
    pub async fn send_batch(&self, events: &[CloudEvent]) -> Result<(), ClientError> {
        for event in events {
            event.validate()?;
        }
        let body = binding::encode_batch(events)?;

        let resp = self
            .http
            .post(self.target.clone())
            .header(reqwest::header::CONTENT_TYPE, BATCH_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        check_response(resp).await
    }
}

async fn check_response(resp: reqwest::Response) -> Result<(), ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.bytes().await.unwrap_or_default();
    let (code, message) = match serde_json::from_slice::<DeliveryStatus>(&body) {
        Ok(parsed) => (parsed.code, parsed.message),
        Err(_) => (
            i32::from(status.as_u16()),
            String::from_utf8_lossy(&body).into_owned(),
        ),
    };
    Err(ClientError::Delivery {
        status,
        code,
        message,
    })
}
