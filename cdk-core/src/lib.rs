#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Runtime shell for CDK connectors.
//!
//! A connector is either a [`Source`](connector::Source) that produces
//! CloudEvents or a [`Sink`](connector::Sink) that consumes them. The
//! [`Coordinator`](runtime::Coordinator) resolves configuration, initializes
//! the connector, runs the matching worker until the process is asked to
//! terminate, then stops the worker and destroys the connector.
//!
//! Most binaries only need [`run_sink`] or [`run_source`]:
//!
//! ```ignore
//! cdk_core::init_tracing();
//! let settings = ConfigResolver::load(&ConfigPaths::from_env());
//! cdk_core::run_sink(settings, MySink::default()).await?;
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod store;

pub use cdk_sdk::CloudEvent;
pub use config::{ConfigPaths, ConfigResolver};
pub use connector::{Connector, Context, DeliveryResult, Sink, Source};
pub use error::{BoxError, RuntimeError};
pub use logging::init_tracing;
pub use runtime::{run_sink, run_source};
