//! Shared types for CDK connectors.
//!
//! This crate holds everything that both ends of a CloudEvents HTTP hop need
//! to agree on: the event model, the HTTP protocol binding and the JSON body
//! a sink returns when it rejects a delivery. The outbound HTTP client lives
//! behind the `client` cargo feature so crates that only decode events do not
//! pull in `reqwest`.

pub mod binding;
#[cfg(feature = "client")]
pub mod client;
pub mod objects;

pub use objects::{CloudEvent, DeliveryStatus, EventError};
