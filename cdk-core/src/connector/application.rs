//! Type-erased connector handles.
//!
//! [`Sink`] and [`Source`] carry an associated settings type, so the runtime
//! cannot hold them as trait objects directly. [`Application`] keeps the
//! connector next to a slot for its parsed settings until `initialize`, then
//! hands the worker a [`Receiver`] or [`Producer`] that no longer mentions
//! the settings type.

use super::{Connector, ConnectorType, Context, DeliveryResult, Sink, Source};
use crate::config::{
    ConfigError, ConfigResolver, ConnectorConfig, FromSettings, SinkConfig, SinkSettings,
    SourceConfig, SourceSettings,
};
use crate::error::BoxError;
use async_trait::async_trait;
use cdk_sdk::CloudEvent;
use cdk_sdk::client::CeClient;
use std::sync::Arc;

/// A running sink, as seen by the sink worker.
#[async_trait]
pub(crate) trait Receiver: Connector {
    async fn receive(&self, ctx: &Context, events: Vec<CloudEvent>) -> DeliveryResult;
}

#[async_trait]
impl<S: Sink> Receiver for S {
    async fn receive(&self, ctx: &Context, events: Vec<CloudEvent>) -> DeliveryResult {
        self.arrived(ctx, events).await
    }
}

/// A running source, as seen by the source worker.
#[async_trait]
pub(crate) trait Producer: Connector {
    async fn produce(&self, ctx: &Context, client: &CeClient) -> Result<(), BoxError>;

    async fn halt(&self) -> Result<(), BoxError>;
}

#[async_trait]
impl<S: Source> Producer for S {
    async fn produce(&self, ctx: &Context, client: &CeClient) -> Result<(), BoxError> {
        self.start(ctx, client).await
    }

    async fn halt(&self) -> Result<(), BoxError> {
        self.stop().await
    }
}

const NOT_PARSED: &str = "connector initialized before its config was parsed";

#[async_trait]
pub(crate) trait PendingSink: Send {
    fn name(&self) -> &str;

    /// Parse and keep the sink's settings, returning the runtime part.
    fn parse_config(&mut self, settings: &ConfigResolver) -> Result<SinkConfig, ConfigError>;

    async fn initialize(&mut self, ctx: &Context) -> Result<(), BoxError>;

    fn into_receiver(self: Box<Self>) -> Arc<dyn Receiver>;
}

struct SinkSlot<S: Sink> {
    sink: S,
    config: Option<S::Config>,
}

#[async_trait]
impl<S: Sink + 'static> PendingSink for SinkSlot<S> {
    fn name(&self) -> &str {
        self.sink.name()
    }

    fn parse_config(&mut self, settings: &ConfigResolver) -> Result<SinkConfig, ConfigError> {
        let config = S::Config::from_settings(settings)?;
        let runtime = config.sink_config().clone();
        self.config = Some(config);
        Ok(runtime)
    }

    async fn initialize(&mut self, ctx: &Context) -> Result<(), BoxError> {
        let config = self.config.take().ok_or(NOT_PARSED)?;
        self.sink.initialize(ctx, config).await
    }

    fn into_receiver(self: Box<Self>) -> Arc<dyn Receiver> {
        Arc::new(self.sink)
    }
}

#[async_trait]
pub(crate) trait PendingSource: Send {
    fn name(&self) -> &str;

    /// Parse and keep the source's settings, returning the runtime part.
    fn parse_config(&mut self, settings: &ConfigResolver) -> Result<SourceConfig, ConfigError>;

    async fn initialize(&mut self, ctx: &Context) -> Result<(), BoxError>;

    fn into_producer(self: Box<Self>) -> Arc<dyn Producer>;
}

struct SourceSlot<S: Source> {
    source: S,
    config: Option<S::Config>,
}

#[async_trait]
impl<S: Source + 'static> PendingSource for SourceSlot<S> {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn parse_config(&mut self, settings: &ConfigResolver) -> Result<SourceConfig, ConfigError> {
        let config = S::Config::from_settings(settings)?;
        let runtime = config.source_config().clone();
        self.config = Some(config);
        Ok(runtime)
    }

    async fn initialize(&mut self, ctx: &Context) -> Result<(), BoxError> {
        let config = self.config.take().ok_or(NOT_PARSED)?;
        self.source.initialize(ctx, config).await
    }

    fn into_producer(self: Box<Self>) -> Arc<dyn Producer> {
        Arc::new(self.source)
    }
}

pub(crate) enum Role {
    Source(Box<dyn PendingSource>),
    Sink(Box<dyn PendingSink>),
}

/// A connector together with its variant tag.
pub struct Application {
    pub(crate) role: Role,
}

impl Application {
    pub fn source(source: impl Source + 'static) -> Self {
        Self {
            role: Role::Source(Box::new(SourceSlot {
                source,
                config: None,
            })),
        }
    }

    pub fn sink(sink: impl Sink + 'static) -> Self {
        Self {
            role: Role::Sink(Box::new(SinkSlot { sink, config: None })),
        }
    }

    pub fn connector_type(&self) -> ConnectorType {
        match self.role {
            Role::Source(_) => ConnectorType::Source,
            Role::Sink(_) => ConnectorType::Sink,
        }
    }

    pub fn name(&self) -> &str {
        match &self.role {
            Role::Source(source) => source.name(),
            Role::Sink(sink) => sink.name(),
        }
    }

    /// Parse the connector's settings type and return the runtime config.
    pub(crate) fn parse_config(
        &mut self,
        settings: &ConfigResolver,
    ) -> Result<ConnectorConfig, ConfigError> {
        match &mut self.role {
            Role::Source(source) => source.parse_config(settings).map(ConnectorConfig::Source),
            Role::Sink(sink) => sink.parse_config(settings).map(ConnectorConfig::Sink),
        }
    }

    /// Hand the parsed settings to the connector's `initialize`.
    pub(crate) async fn initialize(&mut self, ctx: &Context) -> Result<(), BoxError> {
        match &mut self.role {
            Role::Source(source) => source.initialize(ctx).await,
            Role::Sink(sink) => sink.initialize(ctx).await,
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("type", &self.connector_type())
            .field("name", &self.name())
            .finish()
    }
}
