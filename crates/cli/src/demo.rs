//! Built-in demo data source.
//!
//! A monotonic ticker that emits one item per interval, so a fresh
//! install has something to `get` and `watch` immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde_json::json;

use contracts::{DataSource, Item, WatchCallback, WatchSlot};

/// Counter source emitting `{"n": .., "elapsed_ms": ..}` items
pub struct TickerSource {
    slot: WatchSlot,
    count: AtomicU64,
    started: Instant,
}

impl TickerSource {
    pub fn new() -> Self {
        Self {
            slot: WatchSlot::new(),
            count: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Advance the counter and publish the new item to any watcher
    pub fn tick(&self) {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        self.slot.publish(&self.item(n));
    }

    fn item(&self, n: u64) -> Item {
        json!({
            "n": n,
            "elapsed_ms": self.started.elapsed().as_millis() as u64,
        })
    }
}

impl Default for TickerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for TickerSource {
    fn name(&self) -> &str {
        "ticker"
    }

    fn attrs(&self) -> HashMap<String, Item> {
        HashMap::from([("unit".to_string(), json!("ticks"))])
    }

    fn text_template(&self) -> Option<String> {
        Some("tick {{ n }} at {{ elapsed_ms }}ms".to_string())
    }

    fn get(&self) -> Option<Item> {
        Some(self.item(self.count.load(Ordering::Relaxed)))
    }

    fn get_init(&self) -> Option<Item> {
        self.get()
    }

    fn watch(&self, callback: WatchCallback) {
        self.slot.replace(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_starts_at_zero() {
        let ticker = TickerSource::new();
        let item = ticker.get().unwrap();
        assert_eq!(item["n"], 0);
    }

    #[test]
    fn test_tick_reaches_watcher() {
        let ticker = TickerSource::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        ticker.watch(Arc::new(move |item: &Item| {
            assert!(item["n"].as_u64().unwrap() >= 1);
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }));

        ticker.tick();
        ticker.tick();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(ticker.get().unwrap()["n"], 2);
    }
}
