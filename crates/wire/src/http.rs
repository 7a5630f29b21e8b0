//! HTTP/1.1 connection handler (default protocol)
//!
//! Hand-rolled request-line + header parsing; request bodies are never
//! needed. Routes are fixed at construction time against a mount prefix,
//! so embedding into a larger address space means choosing the prefix,
//! not mutating global state.
//!
//! Routes (GET only):
//! - `{prefix}/` - JSON listing of registered sources
//! - `{prefix}/{source}?format=F` - one-shot snapshot
//! - `{prefix}/{source}?watch=1&format=F` - close-delimited watch stream
//! - `{prefix}/meta/server` - bound address of the serving listener

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tracing::{debug, trace};

use contracts::WatchError;
use multiplex::{SourceMultiplexer, SourceRegistry};

use crate::buffer::{BufferWriter, CoalescingBuffer};
use crate::detect::{ConnectionHandler, InboundStream};
use crate::metrics;
use crate::server::ServerHandle;

/// HTTP handler over a source registry
pub struct HttpHandler {
    registry: Arc<SourceRegistry>,
    prefix: String,
    server: ServerHandle,
}

struct Request {
    method: String,
    path: String,
    query: HashMap<String, String>,
}

impl HttpHandler {
    /// Create a handler mounted at `prefix` ("/" or "" mounts at the
    /// root). The server handle may still be unconfigured; only the
    /// `meta/server` route needs it.
    pub fn new(registry: Arc<SourceRegistry>, prefix: &str, server: ServerHandle) -> Self {
        Self {
            registry,
            prefix: prefix.trim_end_matches('/').to_string(),
            server,
        }
    }

    async fn route<R: AsyncRead + Unpin + Send>(
        &self,
        request: &Request,
        reader: &mut BufReader<R>,
        writer: &mut OwnedWriteHalf,
    ) -> io::Result<()> {
        if request.method != "GET" {
            return respond(writer, "405 Method Not Allowed", "text/plain", b"GET only\n").await;
        }

        let Some(rest) = request.path.strip_prefix(&self.prefix) else {
            return respond(writer, "404 Not Found", "text/plain", b"not found\n").await;
        };
        if !rest.is_empty() && !rest.starts_with('/') {
            return respond(writer, "404 Not Found", "text/plain", b"not found\n").await;
        }
        let rest = rest.trim_matches('/');

        match rest {
            "" => {
                let body = serde_json::to_vec_pretty(&self.registry.describe())
                    .unwrap_or_else(|_| b"{}".to_vec());
                respond(writer, "200 OK", "application/json", &body).await
            }
            "meta/server" => match self.server.local_addr() {
                Ok(addr) => {
                    let body = serde_json::to_vec(&json!({"addr": addr.to_string()}))
                        .unwrap_or_default();
                    respond(writer, "200 OK", "application/json", &body).await
                }
                Err(err) => {
                    respond(
                        writer,
                        "503 Service Unavailable",
                        "text/plain",
                        format!("{err}\n").as_bytes(),
                    )
                    .await
                }
            },
            name if !name.contains('/') => {
                let Some(mux) = self.registry.get(name) else {
                    return respond(writer, "404 Not Found", "text/plain", b"no such source\n")
                        .await;
                };
                let format = request
                    .query
                    .get("format")
                    .map(String::as_str)
                    .unwrap_or("json");
                let watching = matches!(
                    request.query.get("watch").map(String::as_str),
                    Some("1") | Some("true")
                );
                if watching {
                    self.stream_watch(&mux, format, reader, writer).await
                } else {
                    get_snapshot(&mux, format, writer).await
                }
            }
            _ => respond(writer, "404 Not Found", "text/plain", b"not found\n").await,
        }
    }

    /// Register a coalescing buffer with the multiplexer and copy ready
    /// batches to the socket until the client goes away or the fan-out
    /// drops the sink.
    async fn stream_watch<R: AsyncRead + Unpin + Send>(
        &self,
        mux: &SourceMultiplexer,
        format: &str,
        reader: &mut BufReader<R>,
        writer: &mut OwnedWriteHalf,
    ) -> io::Result<()> {
        let (ready_tx, mut ready_rx) = CoalescingBuffer::ready_channel();
        let buffer = CoalescingBuffer::new(ready_tx);

        if let Err(err) = mux.watch(format, Box::new(BufferWriter::new(Arc::clone(&buffer)))) {
            return respond(
                writer,
                "400 Bad Request",
                "text/plain",
                format!("{err}\n").as_bytes(),
            )
            .await;
        }
        metrics::record_watch_opened("http");

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
            content_type(format)
        );
        let mut result = writer.write_all(head.as_bytes()).await;

        let mut scratch = Vec::new();
        let mut probe = [0u8; 512];
        while result.is_ok() {
            tokio::select! {
                ready = ready_rx.recv() => {
                    // The channel stays open while we hold the buffer
                    let Some(ready) = ready else { break };
                    ready.drain_into(&mut scratch);
                    result = writer.write_all(&scratch).await;
                }
                read = reader.read(&mut probe) => match read {
                    // Client closed or failed; pipelined bytes are ignored
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                },
            }
        }

        // Closing the buffer makes the next fan-out write fail, which
        // compacts this sink out of the watch stream.
        buffer.close();
        metrics::record_watch_closed("http");
        result
    }
}

async fn get_snapshot(
    mux: &SourceMultiplexer,
    format: &str,
    writer: &mut OwnedWriteHalf,
) -> io::Result<()> {
    let mut body = Vec::new();
    match mux.get(format, &mut body) {
        Ok(()) => respond(writer, "200 OK", content_type(format), &body).await,
        Err(err @ (WatchError::UnsupportedFormat { .. } | WatchError::NotGetable { .. })) => {
            respond(
                writer,
                "400 Bad Request",
                "text/plain",
                format!("{err}\n").as_bytes(),
            )
            .await
        }
        Err(err) => {
            debug!(error = %err, "snapshot failed");
            respond(
                writer,
                "500 Internal Server Error",
                "text/plain",
                format!("{err}\n").as_bytes(),
            )
            .await
        }
    }
}

fn content_type(format: &str) -> &'static str {
    if format.eq_ignore_ascii_case("json") {
        "application/json"
    } else {
        "text/plain"
    }
}

async fn respond(
    writer: &mut OwnedWriteHalf,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> io::Result<()> {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body).await
}

async fn read_request<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> io::Result<Option<Request>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    // Headers are read and discarded; no route needs them.
    loop {
        let mut header = String::new();
        let n = reader.read_line(&mut header).await?;
        if n == 0 || header.trim().is_empty() {
            break;
        }
    }

    let (path, raw_query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query),
        None => (target, ""),
    };
    let query = raw_query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Ok(Some(Request {
        method,
        path,
        query,
    }))
}

#[async_trait]
impl ConnectionHandler for HttpHandler {
    async fn handle(&self, stream: InboundStream, peer: SocketAddr) -> io::Result<()> {
        metrics::record_connection("http");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let Some(request) = read_request(&mut reader).await? else {
            return Ok(());
        };
        trace!(%peer, method = %request.method, path = %request.path, "http request");

        self.route(&request, &mut reader, &mut write_half).await?;
        write_half.shutdown().await
    }
}
