//! Outcome of a single delivery.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cdk_sdk::DeliveryStatus;
use std::borrow::Cow;

/// What a sink reports back for one delivery.
///
/// `code == 0` means success regardless of the message; any other code is a
/// failure whose message is sent back to the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    code: i32,
    message: Cow<'static, str>,
}

impl DeliveryResult {
    pub const SUCCESS_CODE: i32 = 0;

    pub const SUCCESS: Self = Self {
        code: Self::SUCCESS_CODE,
        message: Cow::Borrowed("success"),
    };

    pub fn new(code: i32, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS_CODE
    }

    /// Translate into the transport's acknowledgment: `Ok(())` acknowledges,
    /// `Err` rejects with the code and message.
    pub fn to_transport(&self) -> Result<(), TransportFailure> {
        if self.is_success() {
            return Ok(());
        }
        Err(TransportFailure {
            code: self.code,
            message: self.message.to_string(),
        })
    }
}

impl Default for DeliveryResult {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl std::fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{\"message\": {:?}, \"code\": {}}}",
            self.message, self.code
        )
    }
}

/// A rejected delivery, as seen by the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("delivery failed with code {code}: {message}")]
pub struct TransportFailure {
    pub code: i32,
    pub message: String,
}

impl TransportFailure {
    /// HTTP status for this failure.
    ///
    /// Codes that are client or server error statuses are used as-is; any
    /// other code is reported as `500` and only survives in the body.
    pub fn status(&self) -> StatusCode {
        u16::try_from(self.code)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn to_status_body(&self) -> DeliveryStatus {
        DeliveryStatus {
            message: self.message.clone(),
            code: self.code,
        }
    }
}

impl IntoResponse for TransportFailure {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_status_body())).into_response()
    }
}
