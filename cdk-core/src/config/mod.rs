//! Configuration for connectors.
//!
//! [`ConfigResolver`] answers "what is the value of setting X" through a fixed
//! precedence chain. The typed configs in [`connector`] and [`store`], and a
//! connector's own settings type, are parsed from it once, when the
//! coordinator starts.

pub mod connector;
pub mod resolver;
pub mod store;

pub use connector::{
    ConnectorConfig, FromSettings, SinkConfig, SinkSettings, SourceConfig, SourceSettings,
};
pub use resolver::{ConfigPaths, ConfigResolver};
pub use store::{StoreBackend, StoreConfig};

use thiserror::Error;

/// Errors that can occur while reading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("config file must contain a JSON object")]
    NotAnObject,

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
