//! ItemSink trait - per-connection consumer of a marshaled item stream

use std::io;

use crate::WatchError;

/// Raw byte-stream writer handed to the fan-out by a connection.
///
/// The connection owns its writer (usually a coalescing buffer); the
/// fan-out only holds it for the duration of the watch.
pub type SinkWriter = Box<dyn io::Write + Send>;

/// Consumer of marshaled (pre-framing) items.
///
/// The built-in implementation is the multi-writer frame fan-out in the
/// `multiplex` crate, which frames each item once and replicates it to
/// every attached [`SinkWriter`].
pub trait ItemSink: Send {
    /// Handle one marshaled item.
    ///
    /// # Errors
    /// `WatchError::AllSinksDone` once no downstream writer remains.
    fn handle_item(&mut self, item: &[u8]) -> Result<(), WatchError>;

    /// Handle a batch of marshaled items, preserving relative item order
    /// per downstream writer.
    fn handle_items(&mut self, items: &[Vec<u8>]) -> Result<(), WatchError> {
        for item in items {
            self.handle_item(item)?;
        }
        Ok(())
    }
}
