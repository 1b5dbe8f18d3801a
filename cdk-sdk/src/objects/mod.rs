//! Wire objects exchanged between sources and sinks.

pub mod event;
pub mod status;

pub use event::{CloudEvent, EventError, SPEC_VERSION};
pub use status::DeliveryStatus;
