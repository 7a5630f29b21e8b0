//! DataSource trait - format-agnostic data source abstraction
//!
//! Defines a unified interface for anything that can be observed: a
//! counter, a log ring, an event stream. Decouples data production from
//! marshaling, framing, and transport.

use std::collections::HashMap;
use std::sync::Arc;

/// Dynamic item value emitted by data sources.
///
/// Sources emit whatever structure suits them; formats decide how it is
/// rendered on the wire.
pub type Item = serde_json::Value;

/// Watch callback type
///
/// A source calls the current callback once per emitted item. A `false`
/// return means "stop calling me"; the source must not call a callback
/// again after it returned `false`.
///
/// Uses `Arc` so the callback can be shared with whatever thread or task
/// the source emits from.
pub type WatchCallback = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

/// Format-agnostic data source trait
///
/// # Design Principles
///
/// 1. **Single watcher**: a source holds at most one active callback;
///    registering a new one silently supersedes the previous
///    registration. Multiplexing across formats and connections is the
///    `SourceMultiplexer`'s job, never the source's.
/// 2. **Callback pattern**: uses callbacks instead of channels, so the
///    source never blocks on a slow consumer.
/// 3. **Optional snapshots**: `get` / `get_init` may return `None`; a
///    source can be watch-only, get-only, or both.
pub trait DataSource: Send + Sync {
    /// Source name, used for registry lookup and logging
    fn name(&self) -> &str;

    /// Arbitrary descriptors of the source (units, semantics, ...)
    fn attrs(&self) -> HashMap<String, Item> {
        HashMap::new()
    }

    /// Template text used to construct the "text" format for this
    /// source. `None` means the source has no text rendering.
    fn text_template(&self) -> Option<String> {
        None
    }

    /// One-shot snapshot. `None` results in a `NotGetable` error at the
    /// multiplexer boundary.
    fn get(&self) -> Option<Item>;

    /// Initial data to send to a new watch stream before any live item.
    /// `None` means the stream starts with the first live item; no error
    /// is returned to the watch request.
    fn get_init(&self) -> Option<Item>;

    /// Set the current (singular!) watcher.
    ///
    /// Implementations must call the passed callback for every emitted
    /// item until it returns `false`, or until a new callback is passed
    /// by a future call of `watch`. [`WatchSlot`](crate::WatchSlot)
    /// implements this contract and is the recommended building block.
    fn watch(&self, callback: WatchCallback);
}
