//! Line-delimited JSON format

use contracts::{DataFormat, Item, WatchError};

/// Line-delimited JSON: items are compact JSON, framed by a trailing
/// newline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LdjsonFormat;

impl LdjsonFormat {
    /// Create the format
    pub fn new() -> Self {
        Self
    }

    fn marshal(&self, data: &Item) -> Result<Vec<u8>, WatchError> {
        serde_json::to_vec(data).map_err(|e| WatchError::marshal("json", e.to_string()))
    }
}

impl DataFormat for LdjsonFormat {
    fn marshal_get(&self, data: &Item) -> Result<Vec<u8>, WatchError> {
        self.marshal(data)
    }

    fn marshal_init(&self, data: &Item) -> Result<Vec<u8>, WatchError> {
        self.marshal(data)
    }

    fn marshal_item(&self, item: &Item) -> Result<Vec<u8>, WatchError> {
        self.marshal(item)
    }

    fn frame_item(&self, marshaled: &[u8]) -> Result<Vec<u8>, WatchError> {
        let mut framed = Vec::with_capacity(marshaled.len() + 1);
        framed.extend_from_slice(marshaled);
        framed.push(b'\n');
        Ok(framed)
    }
}
