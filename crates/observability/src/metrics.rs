//! Process-level metric helpers

use metrics::{counter, gauge};

/// Record a data source registration
pub fn record_source_registered(name: &str) {
    counter!("watchmux_sources_registered_total", "source" => name.to_string()).increment(1);
    gauge!("watchmux_sources").increment(1.0);
}
