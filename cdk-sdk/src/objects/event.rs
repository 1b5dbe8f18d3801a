//! CloudEvents 1.0 event model.
//!
//! [`CloudEvent`] keeps the payload as raw bytes so that binary-mode HTTP
//! bodies round-trip untouched. The structured JSON form is produced through
//! an intermediate [`StructuredEvent`], which is also what serde sees.

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// The only CloudEvents specification version accepted.
pub const SPEC_VERSION: &str = "1.0";

/// Content type assumed for the payload when `datacontenttype` is absent.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Errors produced while building, decoding or reading a [`CloudEvent`].
#[derive(Debug, Error)]
pub enum EventError {
    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("unsupported specversion: {0}")]
    UnsupportedSpecVersion(String),

    #[error("invalid time attribute: {0}")]
    InvalidTime(#[from] time::error::Parse),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported event encoding: {0}")]
    UnsupportedEncoding(&'static str),

    #[error("event has no data")]
    NoData,
}

/// A CloudEvents 1.0 event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StructuredEvent", into = "StructuredEvent")]
pub struct CloudEvent {
    pub id: String,
    pub source: String,
    pub ty: String,
    pub specversion: String,
    pub datacontenttype: Option<String>,
    pub dataschema: Option<String>,
    pub subject: Option<String>,
    pub time: Option<OffsetDateTime>,
    /// Extension attributes, keyed by their lower-cased name.
    pub extensions: BTreeMap<String, String>,
    pub data: Option<Bytes>,
}

impl CloudEvent {
    /// Create an event with the three mandatory context attributes.
    pub fn new(id: impl Into<String>, source: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            ty: ty.into(),
            specversion: SPEC_VERSION.to_string(),
            datacontenttype: None,
            dataschema: None,
            subject: None,
            time: None,
            extensions: BTreeMap::new(),
            data: None,
        }
    }

    /// Create an event with a time-ordered random id, stamped with the current time.
    pub fn generate(source: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(Uuid::now_v7().to_string(), source, ty).with_time(OffsetDateTime::now_utc())
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_time(mut self, time: OffsetDateTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_extension(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.extensions
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Attach an opaque payload with its content type.
    pub fn with_data(mut self, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.datacontenttype = Some(content_type.into());
        self.data = Some(data.into());
        self
    }

    /// Serialize `value` as the JSON payload of this event.
    pub fn with_json_data<T: Serialize>(self, value: &T) -> Result<Self, EventError> {
        let data = serde_json::to_vec(value)?;
        Ok(self.with_data(JSON_CONTENT_TYPE, data))
    }

    /// Whether the payload is JSON, treating a missing content type as JSON.
    pub fn is_json(&self) -> bool {
        self.datacontenttype
            .as_deref()
            .is_none_or(|ct| ct.split(';').next().is_some_and(|mime| mime.trim().ends_with("json")))
    }

    /// Deserialize the JSON payload.
    pub fn data_json<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        let data = self.data.as_ref().ok_or(EventError::NoData)?;
        Ok(serde_json::from_slice(data)?)
    }

    /// Check the required context attributes.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.specversion.is_empty() {
            return Err(EventError::MissingAttribute("specversion"));
        }
        if self.specversion != SPEC_VERSION {
            return Err(EventError::UnsupportedSpecVersion(self.specversion.clone()));
        }
        if self.id.is_empty() {
            return Err(EventError::MissingAttribute("id"));
        }
        if self.source.is_empty() {
            return Err(EventError::MissingAttribute("source"));
        }
        if self.ty.is_empty() {
            return Err(EventError::MissingAttribute("type"));
        }
        Ok(())
    }
}

/// The structured-mode JSON shape of an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredEvent {
    #[serde(default)]
    specversion: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    source: String,
    #[serde(default, rename = "type")]
    ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datacontenttype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dataschema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_base64: Option<String>,
    #[serde(flatten)]
    extensions: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<StructuredEvent> for CloudEvent {
    type Error = EventError;

    fn try_from(value: StructuredEvent) -> Result<Self, Self::Error> {
        if value.data_base64.is_some() {
            return Err(EventError::UnsupportedEncoding("data_base64"));
        }

        let time = value
            .time
            .as_deref()
            .map(|t| OffsetDateTime::parse(t, &Rfc3339))
            .transpose()?;

        let extensions = value
            .extensions
            .into_iter()
            .filter_map(|(name, v)| {
                let v = match v {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                Some((name.to_ascii_lowercase(), v))
            })
            .collect();

        let mut event = CloudEvent {
            id: value.id,
            source: value.source,
            ty: value.ty,
            specversion: value.specversion,
            datacontenttype: value.datacontenttype,
            dataschema: value.dataschema,
            subject: value.subject,
            time,
            extensions,
            data: None,
        };

        event.data = match value.data {
            None => None,
            Some(serde_json::Value::String(s)) if !event.is_json() => Some(Bytes::from(s)),
            Some(v) => Some(Bytes::from(serde_json::to_vec(&v)?)),
        };

        event.validate()?;
        Ok(event)
    }
}

impl From<CloudEvent> for StructuredEvent {
    fn from(event: CloudEvent) -> Self {
        let is_json = event.is_json();
        let data = event.data.map(|bytes| {
            if is_json {
                serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                    serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
                })
            } else {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
            }
        });

        StructuredEvent {
            specversion: event.specversion,
            id: event.id,
            source: event.source,
            ty: event.ty,
            datacontenttype: event.datacontenttype,
            dataschema: event.dataschema,
            subject: event.subject,
            time: event.time.and_then(|t| t.format(&Rfc3339).ok()),
            data,
            data_base64: None,
            extensions: event
                .extensions
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect(),
        }
    }
}
