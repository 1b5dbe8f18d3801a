//! Lifecycle coordination for a single connector.

use super::{Worker, select_worker};
use crate::config::{ConfigResolver, FromSettings, StoreConfig};
use crate::connector::{Application, Context};
use crate::error::RuntimeError;
use crate::store::{KvStore, init_kv_store};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Where a run currently is. Phases only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Created,
    ConfigParsed,
    Initialized,
    Started,
    Running,
    Stopping,
    Stopped,
}

/// Drives one connector from configuration to shutdown.
///
/// ```text
/// Created -> ConfigParsed -> Initialized -> Started -> Running -> Stopping -> Stopped
/// ```
///
/// Any failure before `Running` aborts the run with a [`RuntimeError`]; the
/// connector is not destroyed in that case. Once `Running`, the run always
/// ends in `Stopped` and errors during shutdown are only logged.
pub struct Coordinator {
    settings: Arc<ConfigResolver>,
    application: Application,
    phase_tx: watch::Sender<Phase>,
}

impl Coordinator {
    pub fn new(settings: ConfigResolver, application: Application) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Created);
        Self {
            settings: Arc::new(settings),
            application,
            phase_tx,
        }
    }

    /// Observe phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Run the connector until `shutdown` completes.
    pub async fn run<F>(self, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            settings,
            mut application,
            phase_tx,
        } = self;
        let kind = application.connector_type();

        let config = application
            .parse_config(&settings)
            .map_err(|source| RuntimeError::Config { kind, source })?;
        let store_config = StoreConfig::from_settings(&settings)
            .map_err(|source| RuntimeError::Config { kind, source })?;
        let store = init_kv_store(&store_config)
            .await
            .map_err(RuntimeError::Store)?;
        phase_tx.send_replace(Phase::ConfigParsed);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = Context::new(
            application.name().to_string(),
            Arc::clone(&settings),
            Arc::clone(&store),
            shutdown_rx,
        );

        if let Err(e) = application.initialize(&ctx).await {
            close_store(store.as_ref()).await;
            return Err(RuntimeError::Initialize(e));
        }
        phase_tx.send_replace(Phase::Initialized);

        let mut worker = match select_worker(config, application) {
            Ok(worker) => worker,
            Err(e) => {
                close_store(store.as_ref()).await;
                return Err(e);
            }
        };
        if let Err(e) = worker.start(&ctx).await {
            close_store(store.as_ref()).await;
            return Err(RuntimeError::WorkerStart(e));
        }
        phase_tx.send_replace(Phase::Started);
        phase_tx.send_replace(Phase::Running);

        shutdown.await;
        info!("received system signal, beginning shutdown");

        shutdown_tx.send_replace(true);
        phase_tx.send_replace(Phase::Stopping);
        shutdown_worker(worker.as_mut()).await;
        close_store(store.as_ref()).await;
        phase_tx.send_replace(Phase::Stopped);

        Ok(())
    }
}

async fn shutdown_worker(worker: &mut dyn Worker) {
    match worker.stop().await {
        Ok(()) => info!("connector shutdown graceful"),
        Err(e) => error!(error = %e, "connector shutdown error"),
    }
}

async fn close_store(store: &dyn KvStore) {
    if let Err(e) = store.close().await {
        warn!(error = %e, "failed to close kv store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxError;
    use crate::config::{ConfigError, SinkConfig, SinkSettings};
    use crate::connector::{Connector, ConnectorType, DeliveryResult, Sink};
    use cdk_sdk::CloudEvent;
    use cdk_sdk::client::CeClient;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use url::Url;

    fn settings(config: &[(&str, &str)]) -> ConfigResolver {
        let config = config
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigResolver::from_maps(config, HashMap::new()).with_env(Vec::<(String, String)>::new())
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    /// Sink settings with one connector-specific key.
    struct BatchConfig {
        sink: SinkConfig,
        batch_limit: usize,
    }

    impl FromSettings for BatchConfig {
        fn from_settings(settings: &ConfigResolver) -> Result<Self, ConfigError> {
            Ok(Self {
                sink: SinkConfig::from_settings(settings)?,
                batch_limit: settings.parse("batch_limit")?.unwrap_or(10),
            })
        }
    }

    impl SinkSettings for BatchConfig {
        fn sink_config(&self) -> &SinkConfig {
            &self.sink
        }
    }

    #[derive(Clone, Default)]
    struct Tracker {
        initialized: Arc<AtomicBool>,
        batch_limit: Arc<AtomicUsize>,
        delivered: Arc<AtomicUsize>,
        destroyed: Arc<AtomicBool>,
    }

    struct TrackedSink {
        tracker: Tracker,
        fail_initialize: bool,
    }

    impl TrackedSink {
        fn new(tracker: &Tracker) -> Self {
            Self {
                tracker: tracker.clone(),
                fail_initialize: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl Connector for TrackedSink {
        fn name(&self) -> &str {
            "tracked"
        }

        async fn destroy(&self) -> Result<(), BoxError> {
            self.tracker.destroyed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl Sink for TrackedSink {
        type Config = BatchConfig;

        async fn initialize(&mut self, ctx: &Context, config: BatchConfig) -> Result<(), BoxError> {
            assert_eq!(ctx.name(), "tracked");
            if self.fail_initialize {
                return Err("no database".into());
            }
            self.tracker
                .batch_limit
                .store(config.batch_limit, Ordering::SeqCst);
            self.tracker.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn arrived(&self, _ctx: &Context, events: Vec<CloudEvent>) -> DeliveryResult {
            self.tracker
                .delivered
                .fetch_add(events.len(), Ordering::SeqCst);
            DeliveryResult::SUCCESS
        }
    }

    #[tokio::test]
    async fn test_sink_run_to_completion() {
        let port = free_port();
        let tracker = Tracker::default();
        let coordinator = Coordinator::new(
            settings(&[("v_port", &port.to_string()), ("batch_limit", "25")]),
            Application::sink(TrackedSink::new(&tracker)),
        );
        let mut phases = coordinator.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let run = tokio::spawn(coordinator.run(async move {
            let _ = shutdown_rx.await;
        }));

        tokio::time::timeout(Duration::from_secs(5), phases.wait_for(|p| *p == Phase::Running))
            .await
            .unwrap()
            .unwrap();
        assert!(tracker.initialized.load(Ordering::SeqCst));
        assert_eq!(tracker.batch_limit.load(Ordering::SeqCst), 25);

        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        let client = CeClient::new(url).unwrap();
        client
            .send(&CloudEvent::new("1", "/test", "t"))
            .await
            .unwrap();
        assert_eq!(tracker.delivered.load(Ordering::SeqCst), 1);
        assert!(!tracker.destroyed.load(Ordering::SeqCst));

        shutdown_tx.send(()).unwrap();
        run.await.unwrap().unwrap();
        assert_eq!(*phases.borrow(), Phase::Stopped);
        assert!(tracker.destroyed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_initialize_failure_aborts_before_start() {
        let port = free_port();
        let tracker = Tracker::default();
        let sink = TrackedSink {
            fail_initialize: true,
            ..TrackedSink::new(&tracker)
        };
        let coordinator = Coordinator::new(
            settings(&[("v_port", &port.to_string())]),
            Application::sink(sink),
        );
        let phases = coordinator.subscribe();

        let err = coordinator.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Initialize(_)));
        assert!(err.to_string().contains("no database"));
        assert_eq!(*phases.borrow(), Phase::ConfigParsed);
        assert!(!tracker.destroyed.load(Ordering::SeqCst));

        // Nothing ever bound the port.
        std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
    }

    #[tokio::test]
    async fn test_invalid_port_is_config_error() {
        let coordinator = Coordinator::new(
            settings(&[("v_port", "not-a-port")]),
            Application::sink(TrackedSink::new(&Tracker::default())),
        );
        let phases = coordinator.subscribe();

        let err = coordinator.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config {
                kind: ConnectorType::Sink,
                ..
            }
        ));
        assert_eq!(*phases.borrow(), Phase::Created);
    }

    #[tokio::test]
    async fn test_bad_connector_key_is_config_error() {
        let tracker = Tracker::default();
        let coordinator = Coordinator::new(
            settings(&[("v_port", &free_port().to_string()), ("batch_limit", "lots")]),
            Application::sink(TrackedSink::new(&tracker)),
        );
        let phases = coordinator.subscribe();

        let err = coordinator.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config {
                kind: ConnectorType::Sink,
                ..
            }
        ));
        assert!(err.to_string().contains("batch_limit"));
        assert_eq!(*phases.borrow(), Phase::Created);
        assert!(!tracker.initialized.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unknown_store_backend_is_config_error() {
        let coordinator = Coordinator::new(
            settings(&[("store_type", "etcd")]),
            Application::sink(TrackedSink::new(&Tracker::default())),
        );

        let err = coordinator.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Config { .. }));
        assert!(err.to_string().contains("etcd"));
    }

    #[tokio::test]
    async fn test_port_in_use_fails_worker_start() {
        let occupied = tokio::net::TcpListener::bind(("0.0.0.0", 0)).await.unwrap();
        let port = occupied.local_addr().unwrap().port();
        let tracker = Tracker::default();
        let coordinator = Coordinator::new(
            settings(&[("v_port", &port.to_string())]),
            Application::sink(TrackedSink::new(&tracker)),
        );
        let phases = coordinator.subscribe();

        let err = coordinator.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::WorkerStart(_)));
        assert_eq!(*phases.borrow(), Phase::Initialized);
        assert!(tracker.initialized.load(Ordering::SeqCst));
    }
}
