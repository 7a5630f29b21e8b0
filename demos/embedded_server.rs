//! Embedded Server Example
//!
//! Registers a custom data source and serves it over the auto-detecting
//! listener. Try it with:
//!
//!   curl http://127.0.0.1:4040/watch/
//!   curl http://127.0.0.1:4040/watch/load?watch=1
//!   redis-cli -p 4040 get load
//!
//! Run with: cargo run --bin embedded_server

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use contracts::{DataSource, Item, WatchCallback, WatchSlot};
use multiplex::SourceRegistry;
use wire::{resp_detector, HttpHandler, RespHandler, ServerBuilder, ServerHandle};

/// A toy "load" source: a sawtooth value updated once a second
#[derive(Default)]
struct LoadSource {
    slot: WatchSlot,
    value: AtomicU64,
}

impl LoadSource {
    fn advance(&self) {
        let value = (self.value.load(Ordering::Relaxed) + 7) % 100;
        self.value.store(value, Ordering::Relaxed);
        self.slot.publish(&json!({ "load": value }));
    }
}

impl DataSource for LoadSource {
    fn name(&self) -> &str {
        "load"
    }

    fn attrs(&self) -> HashMap<String, Item> {
        HashMap::from([("unit".to_string(), json!("percent"))])
    }

    fn text_template(&self) -> Option<String> {
        Some("load: {{ load }}%".to_string())
    }

    fn get(&self) -> Option<Item> {
        Some(json!({ "load": self.value.load(Ordering::Relaxed) }))
    }

    fn get_init(&self) -> Option<Item> {
        self.get()
    }

    fn watch(&self, callback: WatchCallback) {
        self.slot.replace(callback);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let registry = Arc::new(SourceRegistry::new());
    let load = Arc::new(LoadSource::default());
    registry.add(Arc::clone(&load) as Arc<dyn DataSource>)?;

    tokio::spawn({
        let load = Arc::clone(&load);
        async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                load.advance();
            }
        }
    });

    let handle = ServerHandle::new();
    let http = Arc::new(HttpHandler::new(
        Arc::clone(&registry),
        "/watch",
        handle.clone(),
    ));
    let resp = Arc::new(RespHandler::new(Arc::clone(&registry)));

    let server = ServerBuilder::new(http)
        .with_handle(handle)
        .detect(resp_detector(resp))
        .start("127.0.0.1:4040")
        .await?;

    tracing::info!(addr = %server.local_addr(), "embedded server up, Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}
