//! # Wire
//!
//! Connection plumbing between the multiplexing engine and the network:
//!
//! - [`CoalescingBuffer`] / [`BufferWriter`] - merges a producer's many
//!   small writes, notifying the connection's writer loop once per
//!   idle-to-pending transition
//! - [`Detector`] / [`ConnectionHandler`] - protocol auto-detection
//!   front door over freshly accepted connections
//! - [`ServerBuilder`] / [`RunningServer`] / [`ServerHandle`] -
//!   two-phase server lifecycle: register handlers first, bind later
//! - [`HttpHandler`] (default protocol) and [`RespHandler`]
//!   (line protocol) connection handlers

pub mod buffer;
pub mod detect;
pub mod http;
mod metrics;
pub mod resp;
pub mod server;

pub use buffer::{BufferWriter, CoalescingBuffer, ReadyReceiver, ReadySender};
pub use detect::{ConnectionHandler, Detector, InboundReader, InboundStream};
pub use http::HttpHandler;
pub use resp::{is_resp_tag, resp_detector, RespHandler};
pub use server::{RunningServer, ServerBuilder, ServerHandle};
