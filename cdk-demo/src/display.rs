//! A sink that logs every event it receives.

use async_trait::async_trait;
use bytes::Bytes;
use cdk_core::config::{ConfigError, ConfigResolver, FromSettings, SinkConfig, SinkSettings};
use cdk_core::{BoxError, CloudEvent, Connector, Context, DeliveryResult, Sink};
use tokio::sync::Mutex;

/// Config key holding the value the counter starts from.
const KEY_COUNT: &str = "count";
/// KV store key the running count is written to.
pub const COUNT_KEY: &str = "display/count";

#[derive(Debug)]
pub struct DisplayConfig {
    sink: SinkConfig,
    count: u64,
}

impl FromSettings for DisplayConfig {
    fn from_settings(settings: &ConfigResolver) -> Result<Self, ConfigError> {
        Ok(Self {
            sink: SinkConfig::from_settings(settings)?,
            count: settings.parse(KEY_COUNT)?.unwrap_or(0),
        })
    }
}

impl SinkSettings for DisplayConfig {
    fn sink_config(&self) -> &SinkConfig {
        &self.sink
    }
}

/// Counts received events and writes the running total to the KV store.
///
/// The count lock is held until the store write returns, so concurrent
/// deliveries persist their totals in order.
#[derive(Debug, Default)]
pub struct DisplaySink {
    count: Mutex<u64>,
}

impl DisplaySink {
    pub async fn count(&self) -> u64 {
        *self.count.lock().await
    }
}

#[async_trait]
impl Connector for DisplaySink {
    fn name(&self) -> &str {
        "display"
    }

    async fn destroy(&self) -> Result<(), BoxError> {
        let total = self.count().await;
        tracing::info!(total, "display sink received events");
        Ok(())
    }
}

#[async_trait]
impl Sink for DisplaySink {
    type Config = DisplayConfig;

    async fn initialize(&mut self, _ctx: &Context, config: DisplayConfig) -> Result<(), BoxError> {
        *self.count.get_mut() = config.count;
        Ok(())
    }

    async fn arrived(&self, ctx: &Context, events: Vec<CloudEvent>) -> DeliveryResult {
        let mut count = self.count.lock().await;
        for event in &events {
            *count += 1;
            let data = event
                .data
                .as_deref()
                .map(String::from_utf8_lossy)
                .unwrap_or_default();
            tracing::info!(
                count = *count,
                id = %event.id,
                source = %event.source,
                r#type = %event.ty,
                %data,
                "receive a new event"
            );
        }

        match ctx
            .store()
            .set(COUNT_KEY, Bytes::from(count.to_string()))
            .await
        {
            Ok(()) => DeliveryResult::SUCCESS,
            Err(e) => DeliveryResult::new(500, format!("persist count error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdk_core::store::{KvStore, MemoryStore};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::watch;

    fn settings(config: &[(&str, &str)]) -> ConfigResolver {
        let config = config
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigResolver::from_maps(config, HashMap::new()).with_env(Vec::<(String, String)>::new())
    }

    fn context(store: Arc<dyn KvStore>) -> Context {
        let (_tx, rx) = watch::channel(false);
        Context::new("display", Arc::new(settings(&[])), store, rx)
    }

    async fn initialized(config: &[(&str, &str)], ctx: &Context) -> DisplaySink {
        let mut sink = DisplaySink::default();
        let config = DisplayConfig::from_settings(&settings(config)).unwrap();
        sink.initialize(ctx, config).await.unwrap();
        sink
    }

    #[tokio::test]
    async fn test_counts_from_configured_start() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let ctx = context(store.clone());
        let sink = initialized(&[("count", "10")], &ctx).await;

        let events = vec![
            CloudEvent::new("1", "/test", "t").with_data("text/plain", "hello"),
            CloudEvent::new("2", "/test", "t"),
        ];
        assert!(sink.arrived(&ctx, events).await.is_success());
        assert_eq!(sink.count().await, 12);
        assert_eq!(store.get(COUNT_KEY).await.unwrap(), Bytes::from_static(b"12"));
    }

    #[test]
    fn test_invalid_start_fails_config() {
        let err = DisplayConfig::from_settings(&settings(&[("count", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == KEY_COUNT));
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_persist_final_count() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let ctx = context(store.clone());
        let sink = Arc::new(initialized(&[], &ctx).await);

        let deliveries: Vec<_> = (0..20)
            .map(|i| {
                let sink = Arc::clone(&sink);
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let event = CloudEvent::new(i.to_string(), "/test", "t");
                    sink.arrived(&ctx, vec![event]).await
                })
            })
            .collect();
        for delivery in deliveries {
            assert!(delivery.await.unwrap().is_success());
        }

        assert_eq!(sink.count().await, 20);
        assert_eq!(store.get(COUNT_KEY).await.unwrap(), Bytes::from_static(b"20"));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        store.close().await.unwrap();
        let ctx = context(store);
        let sink = DisplaySink::default();

        let result = sink.arrived(&ctx, vec![CloudEvent::new("1", "/test", "t")]).await;
        assert_eq!(result.code(), 500);
        assert!(result.message().contains("closed"));
    }
}
