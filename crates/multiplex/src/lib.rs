//! # Multiplex
//!
//! The watch-stream multiplexing engine.
//!
//! Responsibilities:
//! - Amortize one `DataSource` subscription across any number of
//!   format x connection combinations
//! - Marshal each emitted item once per watched format
//! - Fan framed items out to every attached connection writer,
//!   compacting the writer list on partial failure
//! - Tear the source subscription down when the last sink departs

pub mod channel;
pub mod compact;
pub mod fanout;
pub mod multiplexer;
pub mod registry;

pub use channel::FormatChannel;
pub use compact::compact_failed;
pub use contracts::{DataFormat, DataSource, ItemSink, SinkWriter, WatchError};
pub use fanout::FrameFanout;
pub use multiplexer::SourceMultiplexer;
pub use registry::SourceRegistry;
