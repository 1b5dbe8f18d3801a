//! Connector contracts.
//!
//! A connector is the user-supplied half of a CDK program. It implements
//! [`Connector`] plus exactly one of [`Source`] or [`Sink`], and is handed to
//! the runtime wrapped in an [`Application`] so that the variant is known
//! without any downcasting.
//!
//! Each variant names its settings type through `Config`. Connectors without
//! keys of their own use [`SinkConfig`](crate::config::SinkConfig) or
//! [`SourceConfig`](crate::config::SourceConfig) directly.

mod application;
mod context;
mod result;

pub use application::Application;
pub(crate) use application::{Producer, Receiver, Role};
pub use context::Context;
pub use result::{DeliveryResult, TransportFailure};

use crate::config::{SinkSettings, SourceSettings};
use crate::error::BoxError;
use async_trait::async_trait;
use bytes::Bytes;
use cdk_sdk::CloudEvent;
use cdk_sdk::client::CeClient;

/// The two connector variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorType {
    Source,
    Sink,
}

impl std::fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorType::Source => write!(f, "source"),
            ConnectorType::Sink => write!(f, "sink"),
        }
    }
}

/// Lifecycle hooks shared by both variants.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    /// Release resources. Called once, after the last delivery has returned.
    async fn destroy(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A connector that consumes events.
#[async_trait]
pub trait Sink: Connector {
    type Config: SinkSettings;

    /// Called once with the parsed settings, before the listener is bound.
    async fn initialize(&mut self, _ctx: &Context, _config: Self::Config) -> Result<(), BoxError> {
        Ok(())
    }

    /// Handle one inbound delivery.
    ///
    /// A binary or structured request carries one event, a batched request
    /// carries several. Deliveries may run concurrently when the sender opens
    /// several connections; implementations guard their own state.
    async fn arrived(&self, ctx: &Context, events: Vec<CloudEvent>) -> DeliveryResult;
}

/// A connector that produces events.
#[async_trait]
pub trait Source: Connector {
    type Config: SourceSettings;

    async fn initialize(&mut self, _ctx: &Context, _config: Self::Config) -> Result<(), BoxError> {
        Ok(())
    }

    /// Run the production loop, pushing events through `client`.
    ///
    /// Runs on the worker's background task and should return once
    /// `ctx` is cancelled.
    async fn start(&self, ctx: &Context, client: &CeClient) -> Result<(), BoxError>;

    /// Turn one raw input record into an event.
    fn adapt(&self, raw: Bytes) -> Result<CloudEvent, BoxError>;

    /// Shutdown hook, called before the worker waits for `start` to return.
    async fn stop(&self) -> Result<(), BoxError> {
        Ok(())
    }
}
