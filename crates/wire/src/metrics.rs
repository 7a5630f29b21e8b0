//! Connection-layer metrics

use metrics::counter;

/// Record an accepted connection, labeled by the protocol it was
/// dispatched to.
pub(crate) fn record_connection(protocol: &'static str) {
    counter!("watchmux_connections_total", "protocol" => protocol).increment(1);
}

/// Record a watch stream attaching to a source
pub(crate) fn record_watch_opened(protocol: &'static str) {
    counter!("watchmux_watches_opened_total", "protocol" => protocol).increment(1);
}

/// Record a watch stream ending
pub(crate) fn record_watch_closed(protocol: &'static str) {
    counter!("watchmux_watches_closed_total", "protocol" => protocol).increment(1);
}
