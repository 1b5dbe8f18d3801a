//! Runtime error types.

use crate::config::ConfigError;
use crate::connector::ConnectorType;
use crate::store::StoreError;
use cdk_sdk::client::ClientError;
use thiserror::Error;

/// Error type returned by connector hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a connector run before it reaches `Running`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("init {kind} config error: {source}")]
    Config {
        kind: ConnectorType,
        #[source]
        source: ConfigError,
    },

    #[error("init kv store error: {0}")]
    Store(#[source] StoreError),

    #[error("connector initialize failed: {0}")]
    Initialize(#[source] BoxError),

    #[error("worker start failed: {0}")]
    WorkerStart(#[source] WorkerError),

    /// The connector and its configuration disagree on the variant. This is
    /// a programming error in how the run was assembled.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

/// Errors raised by a worker while starting or stopping.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to listen port {port}: {source}")]
    Listen {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to init cloudevents client: {0}")]
    Client(#[from] ClientError),

    #[error("worker is not running")]
    NotStarted,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("cloudevents receiver failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("source stopped with error: {0}")]
    Source(#[source] BoxError),

    #[error("connector destroy failed: {0}")]
    Destroy(#[source] BoxError),
}
