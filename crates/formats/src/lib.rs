//! # Formats
//!
//! Built-in marshaling formats for watch streams:
//! - [`LdjsonFormat`] - line-delimited JSON, registered as "json"
//! - [`TemplatedFormat`] - minijinja-rendered text, registered as "text"
//!   when a source provides a template

mod ldjson;
mod templated;

pub use ldjson::LdjsonFormat;
pub use templated::TemplatedFormat;
