//! SourceMultiplexer - one source subscription, many format channels
//!
//! A data source must not have to know how many protocols or formats are
//! watching it, nor pay the cost of re-subscribing per connection. The
//! multiplexer is the single subscriber registered with the source; it
//! fans each emitted item out to every active format channel and
//! voluntarily unsubscribes once every channel reports zero remaining
//! sinks.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use contracts::{DataFormat, DataSource, Item, SinkWriter, WatchCallback, WatchError};
use formats::{LdjsonFormat, TemplatedFormat};

use crate::channel::FormatChannel;

/// State guarded by the one lock per multiplexer instance.
///
/// Attach and the emit path both take this lock, which linearizes a new
/// attach against the decision to unsubscribe when idle.
struct Shared {
    channels: HashMap<String, FormatChannel>,
    /// True iff this multiplexer currently holds the one live
    /// subscription on the source.
    watching: bool,
}

/// Wraps a format-agnostic data source and provides one or more wire
/// formats for it.
pub struct SourceMultiplexer {
    source: Arc<dyn DataSource>,
    formats: HashMap<String, Arc<dyn DataFormat>>,
    format_names: Vec<String>,
    shared: Arc<Mutex<Shared>>,
}

impl SourceMultiplexer {
    /// Wrap a source with the default formats: "json" always, "text"
    /// when the source provides a template.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self::with_formats(source, HashMap::new())
    }

    /// Wrap a source with the default formats plus caller-supplied ones.
    ///
    /// A caller-supplied "json" or "text" overrides the default of the
    /// same name. Format names are lowercased.
    pub fn with_formats(
        source: Arc<dyn DataSource>,
        extra: HashMap<String, Arc<dyn DataFormat>>,
    ) -> Self {
        let mut formats: HashMap<String, Arc<dyn DataFormat>> = HashMap::new();
        let mut format_names: Vec<String> = Vec::new();

        if !extra.contains_key("json") {
            formats.insert("json".into(), Arc::new(LdjsonFormat::new()));
            format_names.push("json".into());
        }

        if let Some(template) = source.text_template() {
            if !extra.contains_key("text") {
                match TemplatedFormat::new(source.name(), &template) {
                    Ok(format) => {
                        formats.insert("text".into(), Arc::new(format));
                        format_names.push("text".into());
                    }
                    Err(err) => {
                        warn!(
                            source = %source.name(),
                            error = %err,
                            "text template failed to compile, skipping text format"
                        );
                    }
                }
            }
        }

        for (name, format) in extra {
            let name = name.to_lowercase();
            if !formats.contains_key(&name) {
                format_names.push(name.clone());
            }
            formats.insert(name, format);
        }

        let channels = formats
            .iter()
            .map(|(name, format)| {
                (
                    name.clone(),
                    FormatChannel::new(name.clone(), Arc::clone(format)),
                )
            })
            .collect();

        Self {
            source,
            formats,
            format_names,
            shared: Arc::new(Mutex::new(Shared {
                channels,
                watching: false,
            })),
        }
    }

    /// Source name passthrough
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Source attrs passthrough
    pub fn attrs(&self) -> HashMap<String, Item> {
        self.source.attrs()
    }

    /// Supported format names, defaults first then registration order
    pub fn formats(&self) -> &[String] {
        &self.format_names
    }

    /// Whether this multiplexer currently holds the live subscription
    pub fn is_watching(&self) -> bool {
        self.shared.lock().unwrap().watching
    }

    /// One-shot get: marshal the source's snapshot to the writer.
    ///
    /// Stateless - no framing, no fan-out registration, no reference to
    /// the writer retained past the call.
    pub fn get(&self, format_name: &str, writer: &mut dyn io::Write) -> Result<(), WatchError> {
        let format = self
            .formats
            .get(&format_name.to_lowercase())
            .ok_or_else(|| WatchError::unsupported_format(format_name))?;
        let data = self
            .source
            .get()
            .ok_or_else(|| WatchError::not_getable(self.source.name()))?;
        let marshaled = format.marshal_get(&data).inspect_err(|err| {
            warn!(source = %self.source.name(), error = %err, "get marshaling error");
        })?;
        writer.write_all(&marshaled)?;
        Ok(())
    }

    /// Attach a connection writer to a format's watch stream.
    ///
    /// Marshals any `get_init` data to the writer, then retains it so
    /// every future emitted item gets marshaled to it as well. The first
    /// successful attach across all formats registers this multiplexer
    /// as the source's single live watcher; re-registering on another
    /// format's first attach is skipped.
    pub fn watch(&self, format_name: &str, writer: SinkWriter) -> Result<(), WatchError> {
        let key = format_name.to_lowercase();
        let init = self.source.get_init();

        let mut shared = self.shared.lock().unwrap();
        let channel = shared
            .channels
            .get_mut(&key)
            .ok_or_else(|| WatchError::unsupported_format(format_name))?;
        channel.attach(init.as_ref(), writer)?;

        let register = !shared.watching;
        if register {
            shared.watching = true;
        }
        drop(shared);

        if register {
            debug!(source = %self.source.name(), "first sink attached, subscribing to source");
            self.source.watch(self.watcher());
        }
        Ok(())
    }

    /// Build the emit callback handed to the source.
    fn watcher(&self) -> WatchCallback {
        let shared = Arc::clone(&self.shared);
        let source_name = self.source.name().to_string();
        Arc::new(move |item: &Item| {
            let mut shared = shared.lock().unwrap();
            if !shared.watching {
                return false;
            }
            let mut any = false;
            for channel in shared.channels.values_mut() {
                if channel.emit(item) {
                    any = true;
                }
            }
            if !any {
                shared.watching = false;
                debug!(source = %source_name, "last sink departed, unsubscribing");
            }
            any
        })
    }
}
