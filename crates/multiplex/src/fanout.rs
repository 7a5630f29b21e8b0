//! FrameFanout - multi-writer frame fan-out
//!
//! Frames one marshaled item and replicates it to every attached
//! connection writer. A writer that fails once is removed permanently;
//! delivery to the remaining writers is never interrupted.

use std::sync::Arc;

use tracing::{debug, warn};

use contracts::{DataFormat, Item, ItemSink, SinkWriter, WatchError};

use crate::compact::compact_failed;

/// Multi-writer frame fan-out.
///
/// Writer list order is insertion order; a writer, once it fails one
/// write, is removed and never retried.
pub struct FrameFanout {
    format_name: String,
    format: Arc<dyn DataFormat>,
    writers: Vec<SinkWriter>,
}

impl FrameFanout {
    /// Create an empty fan-out for one format
    pub fn new(format_name: impl Into<String>, format: Arc<dyn DataFormat>) -> Self {
        Self {
            format_name: format_name.into(),
            format,
            writers: Vec::new(),
        }
    }

    /// Number of attached writers
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// Whether no writer remains
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    /// Attach a writer, optionally sending it an initial snapshot first.
    ///
    /// If `initial` is `Some`, it is marshaled and framed and written to
    /// the new writer before registration, so a new watcher sees a
    /// consistent snapshot before any live item. A marshal, frame, or
    /// write failure leaves the writer unregistered. Registration
    /// happens regardless of whether `initial` was `None`.
    pub fn init(&mut self, initial: Option<&Item>, mut writer: SinkWriter) -> Result<(), WatchError> {
        if let Some(data) = initial {
            let marshaled = self.format.marshal_init(data).inspect_err(|err| {
                warn!(format = %self.format_name, error = %err, "initial marshaling error");
            })?;
            let framed = self.format.frame_item(&marshaled).inspect_err(|err| {
                warn!(format = %self.format_name, error = %err, "initial framing error");
            })?;
            writer.write_all(&framed)?;
        }
        self.writers.push(writer);
        Ok(())
    }

    /// Write framed bytes to every writer, compacting out failures.
    fn write_to_all(&mut self, framed: &[u8]) -> Result<(), WatchError> {
        let mut failed: Vec<usize> = Vec::new();
        for (index, writer) in self.writers.iter_mut().enumerate() {
            if let Err(err) = writer.write_all(framed) {
                debug!(
                    format = %self.format_name,
                    index,
                    error = %err,
                    "sink write failed, removing"
                );
                failed.push(index);
            }
        }
        compact_failed(&mut self.writers, &failed);

        if self.writers.is_empty() {
            return Err(WatchError::AllSinksDone);
        }
        Ok(())
    }
}

impl ItemSink for FrameFanout {
    fn handle_item(&mut self, item: &[u8]) -> Result<(), WatchError> {
        if self.writers.is_empty() {
            return Err(WatchError::AllSinksDone);
        }
        let framed = self.format.frame_item(item).inspect_err(|err| {
            warn!(format = %self.format_name, error = %err, "item framing error");
        })?;
        self.write_to_all(&framed)
    }

    fn handle_items(&mut self, items: &[Vec<u8>]) -> Result<(), WatchError> {
        if self.writers.is_empty() {
            return Err(WatchError::AllSinksDone);
        }
        for item in items {
            let framed = self.format.frame_item(item).inspect_err(|err| {
                warn!(format = %self.format_name, error = %err, "item framing error");
            })?;
            self.write_to_all(&framed)?;
        }
        Ok(())
    }
}
