//! A source that emits a heartbeat event at a fixed interval.

use async_trait::async_trait;
use bytes::Bytes;
use cdk_core::config::{ConfigError, ConfigResolver, FromSettings, SourceConfig, SourceSettings};
use cdk_core::{BoxError, CloudEvent, Connector, Context, Source};
use cdk_sdk::client::CeClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const HEARTBEAT_TYPE: &str = "io.vance.heartbeat";
const HEARTBEAT_SOURCE: &str = "vance-cdk-demo";
const KEY_INTERVAL: &str = "interval_secs";
const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct Heartbeat {
    seq: u64,
    /// RFC 3339 emission time.
    at: String,
}

#[derive(Debug)]
pub struct HeartbeatConfig {
    source: SourceConfig,
    interval: Duration,
}

impl FromSettings for HeartbeatConfig {
    fn from_settings(settings: &ConfigResolver) -> Result<Self, ConfigError> {
        let interval = match settings.parse::<u64>(KEY_INTERVAL)? {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: KEY_INTERVAL.to_string(),
                    value: "0".to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_INTERVAL,
        };
        Ok(Self {
            source: SourceConfig::from_settings(settings)?,
            interval,
        })
    }
}

impl SourceSettings for HeartbeatConfig {
    fn source_config(&self) -> &SourceConfig {
        &self.source
    }
}

#[derive(Debug)]
pub struct HeartbeatSource {
    interval: Duration,
}

impl Default for HeartbeatSource {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[async_trait]
impl Connector for HeartbeatSource {
    fn name(&self) -> &str {
        "heartbeat"
    }
}

#[async_trait]
impl Source for HeartbeatSource {
    type Config = HeartbeatConfig;

    async fn initialize(
        &mut self,
        _ctx: &Context,
        config: HeartbeatConfig,
    ) -> Result<(), BoxError> {
        self.interval = config.interval;
        tracing::info!(interval = ?self.interval, "heartbeat source configured");
        Ok(())
    }

    async fn start(&self, ctx: &Context, client: &CeClient) -> Result<(), BoxError> {
        let mut ticker = tokio::time::interval(self.interval);
        let mut seq = 0u64;
        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = ticker.tick() => {
                    seq += 1;
                    let payload = serde_json::to_vec(&Heartbeat {
                        seq,
                        at: OffsetDateTime::now_utc().format(&Rfc3339)?,
                    })?;
                    let event = self.adapt(Bytes::from(payload))?;
                    match client.send(&event).await {
                        Ok(()) => tracing::debug!(seq, id = %event.id, "heartbeat delivered"),
                        Err(e) => tracing::warn!(seq, error = %e, "failed to deliver heartbeat"),
                    }
                }
            }
        }
        Ok(())
    }

    fn adapt(&self, raw: Bytes) -> Result<CloudEvent, BoxError> {
        let heartbeat: Heartbeat = serde_json::from_slice(&raw)?;
        Ok(CloudEvent::generate(HEARTBEAT_SOURCE, HEARTBEAT_TYPE)
            .with_subject(heartbeat.seq.to_string())
            .with_data("application/json", raw))
    }
}
