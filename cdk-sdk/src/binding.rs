//! CloudEvents HTTP protocol binding.
//!
//! Decoding accepts all three content modes:
//!
//! - **binary**: context attributes in `ce-*` headers, payload as the body
//! - **structured**: `application/cloudevents+json`, one event per body
//! - **batched**: `application/cloudevents-batch+json`, a JSON array of events
//!
//! Encoding produces binary mode for single events and batched mode for
//! slices. The functions here work on plain `(name, value)` header pairs so
//! that both the axum receiver and the reqwest client can share them.

use crate::objects::{CloudEvent, EventError};
use bytes::Bytes;
use std::borrow::Cow;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const CONTENT_TYPE: &str = "content-type";
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";
pub const BATCH_CONTENT_TYPE: &str = "application/cloudevents-batch+json";

const HEADER_PREFIX: &str = "ce-";

/// How an HTTP message carries its event(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Binary,
    Structured,
    Batch,
}

impl Mode {
    /// Detect the content mode from a `Content-Type` header value.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase());
        match mime.as_deref() {
            Some(STRUCTURED_CONTENT_TYPE) => Mode::Structured,
            Some(BATCH_CONTENT_TYPE) => Mode::Batch,
            _ => Mode::Binary,
        }
    }
}

/// A binary-mode HTTP message ready to be sent.
#[derive(Debug, Clone)]
pub struct BinaryMessage {
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Decode the event(s) carried by an HTTP request.
///
/// Header names are matched case-insensitively.
pub fn decode<'a, I>(headers: I, body: Bytes) -> Result<Vec<CloudEvent>, EventError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut content_type = None;
    let mut attributes = BTreeMap::new();
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        if name == CONTENT_TYPE {
            content_type = Some(value.to_owned());
        } else if let Some(attribute) = name.strip_prefix(HEADER_PREFIX) {
            attributes.insert(attribute.to_owned(), decode_header_value(value));
        }
    }

    match Mode::from_content_type(content_type.as_deref()) {
        Mode::Structured => Ok(vec![serde_json::from_slice(&body)?]),
        Mode::Batch => Ok(serde_json::from_slice(&body)?),
        Mode::Binary => decode_binary(content_type, attributes, body).map(|event| vec![event]),
    }
}

fn decode_binary(
    content_type: Option<String>,
    mut attributes: BTreeMap<String, String>,
    body: Bytes,
) -> Result<CloudEvent, EventError> {
    let specversion = attributes
        .remove("specversion")
        .ok_or(EventError::MissingAttribute("specversion"))?;
    let id = attributes
        .remove("id")
        .ok_or(EventError::MissingAttribute("id"))?;
    let source = attributes
        .remove("source")
        .ok_or(EventError::MissingAttribute("source"))?;
    let ty = attributes
        .remove("type")
        .ok_or(EventError::MissingAttribute("type"))?;
    let time = attributes
        .remove("time")
        .map(|t| OffsetDateTime::parse(&t, &Rfc3339))
        .transpose()?;

    let event = CloudEvent {
        id,
        source,
        ty,
        specversion,
        datacontenttype: content_type,
        dataschema: attributes.remove("dataschema"),
        subject: attributes.remove("subject"),
        time,
        extensions: attributes,
        data: (!body.is_empty()).then_some(body),
    };
    event.validate()?;
    Ok(event)
}

/// Encode one event as a binary-mode message.
pub fn encode_binary(event: &CloudEvent) -> BinaryMessage {
    let mut headers = vec![
        header("specversion", &event.specversion),
        header("id", &event.id),
        header("source", &event.source),
        header("type", &event.ty),
    ];
    if let Some(subject) = &event.subject {
        headers.push(header("subject", subject));
    }
    if let Some(dataschema) = &event.dataschema {
        headers.push(header("dataschema", dataschema));
    }
    if let Some(time) = event.time.and_then(|t| t.format(&Rfc3339).ok()) {
        headers.push(header("time", &time));
    }
    for (name, value) in &event.extensions {
        headers.push(header(name, value));
    }
    if let Some(content_type) = &event.datacontenttype {
        headers.push((CONTENT_TYPE.to_string(), content_type.clone()));
    }

    BinaryMessage {
        headers,
        body: event.data.clone().unwrap_or_default(),
    }
}

/// Encode events as a batched-mode JSON body.
pub fn encode_batch(events: &[CloudEvent]) -> Result<Bytes, EventError> {
    Ok(Bytes::from(serde_json::to_vec(events)?))
}

fn header(attribute: &str, value: &str) -> (String, String) {
    (
        format!("{HEADER_PREFIX}{attribute}"),
        encode_header_value(value).into_owned(),
    )
}

/// Percent-encode a header value only when it contains characters that are
/// not allowed verbatim (non-printable ASCII, `"` or `%`).
fn encode_header_value(value: &str) -> Cow<'_, str> {
    let needs_encoding = value
        .chars()
        .any(|c| !(' '..='~').contains(&c) || c == '"' || c == '%');
    if needs_encoding {
        urlencoding::encode(value)
    } else {
        Cow::Borrowed(value)
    }
}

fn decode_header_value(value: &str) -> String {
    urlencoding::decode(value)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| value.to_owned())
}
