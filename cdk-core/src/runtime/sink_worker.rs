//! Worker for sink connectors.

use super::Worker;
use crate::config::SinkConfig;
use crate::connector::{Connector, Context, Receiver, TransportFailure};
use crate::error::WorkerError;
use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use cdk_sdk::binding;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Runs a [`Sink`](crate::Sink) behind a CloudEvents HTTP receiver.
///
/// `start` binds the listener and spawns the receive task; `stop` closes the
/// listener, lets in-flight deliveries finish, waits for the task and then
/// destroys the sink.
pub struct SinkWorker {
    config: SinkConfig,
    sink: Arc<dyn Receiver>,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<std::io::Result<()>>>,
    local_addr: Option<SocketAddr>,
    stopped: bool,
}

impl SinkWorker {
    pub(crate) fn new(config: SinkConfig, sink: Arc<dyn Receiver>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            sink,
            stop_tx,
            handle: None,
            local_addr: None,
            stopped: false,
        }
    }

    /// Address the receiver is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl Worker for SinkWorker {
    async fn start(&mut self, ctx: &Context) -> Result<(), WorkerError> {
        let port = self.config.port;
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|source| WorkerError::Listen { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| WorkerError::Listen { port, source })?;

        let stop_rx = self.stop_tx.subscribe();
        let app = router(ReceiverState {
            sink: Arc::clone(&self.sink),
            ctx: ctx.with_shutdown(stop_rx.clone()),
            stop_rx: stop_rx.clone(),
        });

        let mut shutdown_rx = stop_rx;
        self.handle = Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                })
                .await
        }));
        self.local_addr = Some(local_addr);

        info!(
            name = %self.sink.name(),
            listening = %local_addr,
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
        let drained = match handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WorkerError::Serve(e)),
            Err(e) => Err(WorkerError::Task(e)),
        };
        if let Err(e) = &drained {
            error!(name = %self.sink.name(), error = %e, "receive task ended abnormally");
        }
        debug!(name = %self.sink.name(), "receive task drained");

        self.sink.destroy().await.map_err(WorkerError::Destroy)?;
        drained
    }
}

#[derive(Clone)]
struct ReceiverState {
    sink: Arc<dyn Receiver>,
    ctx: Context,
    stop_rx: watch::Receiver<bool>,
}

/// Events are accepted by `POST` on any path.
fn router(state: ReceiverState) -> Router {
    Router::new()
        .route("/", post(receive))
        .route("/{*path}", post(receive))
        .with_state(state)
}

async fn receive(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if *state.stop_rx.borrow() {
        return reject(StatusCode::SERVICE_UNAVAILABLE, "connector is shutting down");
    }

    let pairs = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)));
    let events = match binding::decode(pairs, body) {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "failed to decode inbound event");
            return reject(StatusCode::BAD_REQUEST, format!("parsing event error: {e}"));
        }
    };
    if events.is_empty() {
        return StatusCode::OK.into_response();
    }

    debug!(count = events.len(), id = %events[0].id, "delivering events");
    let result = state.sink.receive(&state.ctx, events).await;
    match result.to_transport() {
        Ok(()) => StatusCode::OK.into_response(),
        Err(failure) => {
            debug!(code = failure.code, message = %failure.message, "delivery rejected by sink");
            failure.into_response()
        }
    }
}

fn reject(status: StatusCode, message: impl Into<String>) -> Response {
    TransportFailure {
        code: i32::from(status.as_u16()),
        message: message.into(),
    }
    .into_response()
}
