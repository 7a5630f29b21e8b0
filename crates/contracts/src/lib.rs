//! # Contracts
//!
//! Frozen interface contracts (ICD), defining the traits and error types
//! shared by every watchmux crate. All business crates can only depend on
//! this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - Sources emit dynamic [`Item`] values (`serde_json::Value`)
//! - Formats marshal and frame items into bytes
//! - Sinks consume framed bytes, one sink per connection

mod error;
mod format;
mod sink;
mod source;
mod subscription;

pub use error::WatchError;
pub use format::DataFormat;
pub use sink::{ItemSink, SinkWriter};
pub use source::{DataSource, Item, WatchCallback};
pub use subscription::WatchSlot;
