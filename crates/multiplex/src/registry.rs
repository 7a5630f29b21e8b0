//! SourceRegistry - name-indexed collection of multiplexed sources
//!
//! Protocol handlers resolve source names against one shared registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::json;
use tracing::debug;

use contracts::{DataSource, Item, WatchError};

use crate::multiplexer::SourceMultiplexer;

/// Shared registry of multiplexed data sources
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Arc<SourceMultiplexer>>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, wrapping it with the default formats.
    ///
    /// # Errors
    /// `DuplicateSource` when a source with the same name exists.
    pub fn add(&self, source: Arc<dyn DataSource>) -> Result<(), WatchError> {
        self.add_multiplexer(Arc::new(SourceMultiplexer::new(source)))
    }

    /// Register a pre-built multiplexer (custom formats).
    pub fn add_multiplexer(&self, mux: Arc<SourceMultiplexer>) -> Result<(), WatchError> {
        let name = mux.name().to_string();
        let mut sources = self.sources.write().unwrap();
        if sources.contains_key(&name) {
            return Err(WatchError::DuplicateSource { name });
        }
        debug!(source = %name, formats = ?mux.formats(), "data source registered");
        sources.insert(name, mux);
        Ok(())
    }

    /// Look a source up by name
    pub fn get(&self, name: &str) -> Option<Arc<SourceMultiplexer>> {
        self.sources.read().unwrap().get(name).cloned()
    }

    /// Registered source names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// JSON listing of every source with its formats and attrs, used by
    /// the protocol handlers' index endpoints.
    pub fn describe(&self) -> Item {
        let sources = self.sources.read().unwrap();
        let mut listing = serde_json::Map::new();
        for (name, mux) in sources.iter() {
            listing.insert(
                name.clone(),
                json!({
                    "formats": mux.formats(),
                    "attrs": mux.attrs(),
                }),
            );
        }
        Item::Object(listing)
    }
}
