//! Worker for source connectors.

use super::Worker;
use crate::config::SourceConfig;
use crate::connector::{Connector, Context, Producer};
use crate::error::{BoxError, WorkerError};
use async_trait::async_trait;
use cdk_sdk::client::CeClient;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Runs a [`Source`](crate::Source)'s production loop against the configured target.
pub struct SourceWorker {
    config: SourceConfig,
    source: Arc<dyn Producer>,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<Result<(), BoxError>>>,
    stopped: bool,
}

impl SourceWorker {
    pub(crate) fn new(config: SourceConfig, source: Arc<dyn Producer>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            source,
            stop_tx,
            handle: None,
            stopped: false,
        }
    }
}

#[async_trait]
impl Worker for SourceWorker {
    async fn start(&mut self, ctx: &Context) -> Result<(), WorkerError> {
        let client = CeClient::new(self.config.target.clone())?;
        let ctx = ctx.with_shutdown(self.stop_tx.subscribe());
        let source = Arc::clone(&self.source);

        self.handle = Some(tokio::spawn(async move {
            let result = source.produce(&ctx, &client).await;
            match &result {
                Ok(()) => info!(name = %source.name(), "source production loop finished"),
                Err(e) => {
                    error!(name = %source.name(), error = %e, "source production loop failed")
                }
            }
            result
        }));

        info!(
            name = %self.source.name(),
            target = %self.config.target,
            "the connector started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WorkerError> {
        if self.stopped {
            return Ok(());
        }
        let handle = self.handle.take().ok_or(WorkerError::NotStarted)?;
        self.stopped = true;

        self.stop_tx.send_replace(true);
        if let Err(e) = self.source.halt().await {
            warn!(name = %self.source.name(), error = %e, "source stop hook failed");
        }

        let drained = match handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WorkerError::Source(e)),
            Err(e) => Err(WorkerError::Task(e)),
        };

        self.source.destroy().await.map_err(WorkerError::Destroy)?;
        drained
    }
}
