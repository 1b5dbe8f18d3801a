//! Typed connector configuration.

use super::ConfigError;
use super::resolver::{ConfigResolver, DEFAULT_PORT, KEY_PORT, KEY_TARGET};
use crate::connector::ConnectorType;
use url::Url;

/// A configuration object that can be populated from resolved settings.
pub trait FromSettings: Sized {
    fn from_settings(settings: &ConfigResolver) -> Result<Self, ConfigError>;
}

/// Settings of a sink connector.
///
/// A sink with keys of its own declares a struct that embeds [`SinkConfig`]
/// and implements this trait; the coordinator parses it before the sink is
/// initialized, so a bad key fails the run as a configuration error.
pub trait SinkSettings: FromSettings + Send + Sync + 'static {
    fn sink_config(&self) -> &SinkConfig;
}

/// Settings of a source connector. See [`SinkSettings`].
pub trait SourceSettings: FromSettings + Send + Sync + 'static {
    fn source_config(&self) -> &SourceConfig;
}

/// Runtime settings of a sink connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Port the CloudEvents receiver listens on. `0` lets the OS pick one.
    pub port: u16,
}

impl FromSettings for SinkConfig {
    fn from_settings(settings: &ConfigResolver) -> Result<Self, ConfigError> {
        Ok(Self {
            port: settings.parse(KEY_PORT)?.unwrap_or(DEFAULT_PORT),
        })
    }
}

impl SinkSettings for SinkConfig {
    fn sink_config(&self) -> &SinkConfig {
        self
    }
}

/// Runtime settings of a source connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Where produced events are delivered.
    pub target: Url,
}

impl FromSettings for SourceConfig {
    fn from_settings(settings: &ConfigResolver) -> Result<Self, ConfigError> {
        let target = settings.sink_target();
        let target = target.parse().map_err(|e: url::ParseError| ConfigError::InvalidValue {
            key: KEY_TARGET.to_string(),
            reason: e.to_string(),
            value: target.clone(),
        })?;
        Ok(Self { target })
    }
}

impl SourceSettings for SourceConfig {
    fn source_config(&self) -> &SourceConfig {
        self
    }
}

/// The runtime settings of either connector variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorConfig {
    Source(SourceConfig),
    Sink(SinkConfig),
}

impl ConnectorConfig {
    pub fn connector_type(&self) -> ConnectorType {
        match self {
            ConnectorConfig::Source(_) => ConnectorType::Source,
            ConnectorConfig::Sink(_) => ConnectorType::Sink,
        }
    }
}
