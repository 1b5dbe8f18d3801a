//! Per-run context handed to connector hooks.

use crate::config::ConfigResolver;
use crate::store::KvStore;
use std::sync::Arc;
use tokio::sync::watch;

/// Everything a connector may need from the runtime.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct Context {
    name: Arc<str>,
    settings: Arc<ConfigResolver>,
    store: Arc<dyn KvStore>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Context {
    pub fn new(
        name: impl Into<Arc<str>>,
        settings: Arc<ConfigResolver>,
        store: Arc<dyn KvStore>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            store,
            shutdown_rx,
        }
    }

    /// Name of the running connector.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved settings, for connector-specific keys.
    pub fn settings(&self) -> &ConfigResolver {
        &self.settings
    }

    /// The KV store shared by the whole process.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Wait until the run is cancelled.
    ///
    /// Also returns when the cancelling side has gone away.
    pub async fn cancelled(&self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    }

    /// A copy of this context driven by a different cancellation signal.
    pub(crate) fn with_shutdown(&self, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            shutdown_rx,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
