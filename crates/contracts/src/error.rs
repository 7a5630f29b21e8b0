//! Layered error definitions
//!
//! Categorized by source: config / format / sink / server

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum WatchError {
    // ===== Configuration Errors =====
    /// Requested format name is not registered for the source
    #[error("unsupported format: {name}")]
    UnsupportedFormat { name: String },

    /// Source has no snapshot data to return. The field is the source
    /// name; calling it `source` would make thiserror treat it as the
    /// error's cause.
    #[error("source '{name}' not getable")]
    NotGetable { name: String },

    /// Source name already registered
    #[error("data source already defined: {name}")]
    DuplicateSource { name: String },

    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse { message: String },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Format Errors =====
    /// Item marshaling error (isolated to the affected format)
    #[error("format '{format}' marshal error: {message}")]
    Marshal { format: String, message: String },

    /// Item framing error (isolated to the affected format)
    #[error("format '{format}' frame error: {message}")]
    Frame { format: String, message: String },

    // ===== Sink Errors =====
    /// Write after close on a connection buffer
    #[error("buffer closed")]
    BufferClosed,

    /// Fan-out has no remaining writable sinks.
    ///
    /// Distinct from a write error: the owning channel uses this to know
    /// when to stop asking for future items.
    #[error("all sinks done")]
    AllSinksDone,

    // ===== Server Errors =====
    /// Operation on a server handle that has not been started yet
    #[error("no server configured")]
    NoServerConfigured,

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Create an unsupported-format error
    pub fn unsupported_format(name: impl Into<String>) -> Self {
        Self::UnsupportedFormat { name: name.into() }
    }

    /// Create a not-getable error
    pub fn not_getable(source: impl Into<String>) -> Self {
        Self::NotGetable {
            name: source.into(),
        }
    }

    /// Create a marshal error
    pub fn marshal(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Marshal {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Create a frame error
    pub fn frame(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Frame {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Create a configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
        }
    }

    /// Create a configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}
