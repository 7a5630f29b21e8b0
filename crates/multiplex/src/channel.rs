//! FormatChannel - per-format watch channel
//!
//! Owns the frame fan-out for one (source, format) pair and manages the
//! "is anyone watching this format" lifecycle. Created once per format
//! at multiplexer construction; never destroyed, only emptied and
//! refilled.

use std::sync::Arc;

use tracing::warn;

use contracts::{DataFormat, Item, ItemSink, SinkWriter, WatchError};

use crate::fanout::FrameFanout;

/// Format-scoped watch channel
pub struct FormatChannel {
    format_name: String,
    format: Arc<dyn DataFormat>,
    fanout: FrameFanout,
    /// Live once at least one connection has attached. Unwatched formats
    /// pay no marshal or frame cost per emitted item.
    registered: bool,
}

impl FormatChannel {
    /// Create an idle channel for one format
    pub fn new(format_name: impl Into<String>, format: Arc<dyn DataFormat>) -> Self {
        let format_name = format_name.into();
        Self {
            fanout: FrameFanout::new(format_name.clone(), Arc::clone(&format)),
            format_name,
            format,
            registered: false,
        }
    }

    /// Format name this channel serves
    pub fn format_name(&self) -> &str {
        &self.format_name
    }

    /// Number of attached sinks
    pub fn sink_count(&self) -> usize {
        self.fanout.len()
    }

    /// Attach a new connection writer.
    ///
    /// Writes the source's initial snapshot (when present) to the writer
    /// before any live item, then registers it with the fan-out. The
    /// very first attach makes the channel eligible for live items.
    pub fn attach(&mut self, init: Option<&Item>, writer: SinkWriter) -> Result<(), WatchError> {
        self.fanout.init(init, writer)?;
        if !self.fanout.is_empty() {
            self.registered = true;
        }
        Ok(())
    }

    /// Deliver one live item to every attached sink.
    ///
    /// Marshals the raw item once for this format, then hands it to the
    /// fan-out. Returns whether any sink remains. Marshal errors are
    /// logged and reported as "no sinks reachable for this item"; other
    /// formats are unaffected.
    pub fn emit(&mut self, item: &Item) -> bool {
        if !self.registered || self.fanout.is_empty() {
            return false;
        }
        let marshaled = match self.format.marshal_item(item) {
            Ok(buf) => buf,
            Err(err) => {
                warn!(format = %self.format_name, error = %err, "item marshaling error");
                return false;
            }
        };
        match self.fanout.handle_item(&marshaled) {
            Ok(()) => true,
            Err(WatchError::AllSinksDone) => {
                self.registered = false;
                false
            }
            Err(err) => {
                warn!(format = %self.format_name, error = %err, "item delivery error");
                self.registered = false;
                false
            }
        }
    }
}
