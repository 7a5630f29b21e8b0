//! DataFormat trait - marshaling + framing strategy for a watch stream

use crate::{Item, WatchError};

/// Data format trait
///
/// Provides both a data marshaling protocol and a framing protocol for
/// the watch stream. A format is stateless and pure; any marshal or
/// frame error breaks the watch streams subscribed to this format, not
/// the process and not other formats.
pub trait DataFormat: Send + Sync {
    /// Serialize data returned by `DataSource::get`
    fn marshal_get(&self, data: &Item) -> Result<Vec<u8>, WatchError>;

    /// Serialize data returned by `DataSource::get_init`
    fn marshal_init(&self, data: &Item) -> Result<Vec<u8>, WatchError>;

    /// Serialize an item passed to a watch callback
    fn marshal_item(&self, item: &Item) -> Result<Vec<u8>, WatchError>;

    /// Wrap a marshaled item so stream boundaries are recoverable by a
    /// reader
    fn frame_item(&self, marshaled: &[u8]) -> Result<Vec<u8>, WatchError>;
}
