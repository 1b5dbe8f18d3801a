//! Connector runtime.
//!
//! The [`Coordinator`] drives one connector through its lifecycle. The
//! connector variant decides which [`Worker`] runs it:
//!
//! - [`SinkWorker`]: binds the listen port and feeds inbound CloudEvents to
//!   the sink on a background receive task
//! - [`SourceWorker`]: builds the outbound client and runs the source's
//!   production loop on a background task
//!
//! Both workers own exactly one background task and wait for it in `stop`
//! before the connector is destroyed.

mod coordinator;
mod shutdown;
mod sink_worker;
mod source_worker;

pub use coordinator::{Coordinator, Phase};
pub use shutdown::shutdown_signal;
pub use sink_worker::SinkWorker;
pub use source_worker::SourceWorker;

use crate::config::{ConfigResolver, ConnectorConfig};
use crate::connector::{Application, Context, Role, Sink, Source};
use crate::error::{RuntimeError, WorkerError};
use async_trait::async_trait;

/// Execution strategy for one connector variant.
#[async_trait]
pub trait Worker: Send {
    /// Acquire network resources and spawn the background task.
    ///
    /// Returns once the worker is ready; for a sink that means the listener
    /// is bound.
    async fn start(&mut self, ctx: &Context) -> Result<(), WorkerError>;

    /// Stop the background task, wait for it to finish, then destroy the
    /// connector.
    async fn stop(&mut self) -> Result<(), WorkerError>;
}

/// Pick the worker for a configured connector.
///
/// The config and the connector must be of the same variant; anything else
/// means the run was assembled wrongly and is reported as
/// [`RuntimeError::InvariantViolated`] without touching the network.
pub fn select_worker(
    config: ConnectorConfig,
    application: Application,
) -> Result<Box<dyn Worker>, RuntimeError> {
    let kind = application.connector_type();
    let name = application.name().to_string();
    match (config, application.role) {
        (ConnectorConfig::Sink(config), Role::Sink(sink)) => {
            Ok(Box::new(SinkWorker::new(config, sink.into_receiver())))
        }
        (ConnectorConfig::Source(config), Role::Source(source)) => {
            Ok(Box::new(SourceWorker::new(config, source.into_producer())))
        }
        (config, _) => Err(RuntimeError::InvariantViolated(format!(
            "unknown connector type: {} config given to {kind} connector {name:?}",
            config.connector_type(),
        ))),
    }
}

/// Run a sink until the process receives SIGTERM or SIGINT.
pub async fn run_sink(
    settings: ConfigResolver,
    sink: impl Sink + 'static,
) -> Result<(), RuntimeError> {
    run(settings, Application::sink(sink)).await
}

/// Run a source until the process receives SIGTERM or SIGINT.
pub async fn run_source(
    settings: ConfigResolver,
    source: impl Source + 'static,
) -> Result<(), RuntimeError> {
    run(settings, Application::source(source)).await
}

async fn run(settings: ConfigResolver, application: Application) -> Result<(), RuntimeError> {
    let kind = application.connector_type();
    Coordinator::new(settings, application)
        .run(shutdown_signal())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "run {kind} error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxError;
    use crate::config::{SinkConfig, SourceConfig};
    use crate::connector::{Connector, DeliveryResult};
    use bytes::Bytes;
    use cdk_sdk::CloudEvent;
    use cdk_sdk::client::CeClient;

    struct NullSink;

    #[async_trait]
    impl Connector for NullSink {
        fn name(&self) -> &str {
            "null-sink"
        }
    }

    #[async_trait]
    impl Sink for NullSink {
        type Config = SinkConfig;

        async fn arrived(&self, _ctx: &Context, _events: Vec<CloudEvent>) -> DeliveryResult {
            DeliveryResult::SUCCESS
        }
    }

    struct NullSource;

    #[async_trait]
    impl Connector for NullSource {
        fn name(&self) -> &str {
            "null-source"
        }
    }

    #[async_trait]
    impl Source for NullSource {
        type Config = SourceConfig;

        async fn start(&self, ctx: &Context, _client: &CeClient) -> Result<(), BoxError> {
            ctx.cancelled().await;
            Ok(())
        }

        fn adapt(&self, _raw: Bytes) -> Result<CloudEvent, BoxError> {
            Err("nothing to adapt".into())
        }
    }

    fn sink_config() -> ConnectorConfig {
        ConnectorConfig::Sink(SinkConfig { port: 0 })
    }

    fn source_config() -> ConnectorConfig {
        ConnectorConfig::Source(SourceConfig {
            target: "http://localhost:8081".parse().unwrap(),
        })
    }

    #[test]
    fn test_select_matching_worker() {
        assert!(select_worker(sink_config(), Application::sink(NullSink)).is_ok());
        assert!(select_worker(source_config(), Application::source(NullSource)).is_ok());
    }

    #[test]
    fn test_mismatched_variant_is_invariant_violation() {
        let err = select_worker(source_config(), Application::sink(NullSink))
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::InvariantViolated(_)));
        assert!(err.to_string().contains("null-sink"));

        let err = select_worker(sink_config(), Application::source(NullSource))
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::InvariantViolated(_)));
    }
}
