//! RESP connection handler (line protocol)
//!
//! Speaks enough of the Redis serialization protocol to drive the
//! registry from `redis-cli` or a raw socket: commands arrive as RESP
//! arrays or inline words, replies use standard RESP framing. Watch
//! streams write the format's own framing after `+OK`, raw on the
//! connection.
//!
//! Commands: `ls`, `get <source> [format]`, `watch <source> [format]`,
//! `ping`, `quit`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tracing::trace;

use multiplex::{SourceMultiplexer, SourceRegistry};

use crate::buffer::{BufferWriter, CoalescingBuffer};
use crate::detect::{ConnectionHandler, Detector, InboundStream};
use crate::metrics;

/// Most arguments any supported command takes, with headroom
const MAX_COMMAND_ARGS: usize = 16;

/// Longest bulk string accepted in a command (source and format names
/// are short; the limit only bounds allocation, not replies)
const MAX_BULK_LEN: usize = 4096;

/// First-byte tag of a RESP array (the form every RESP client opens
/// with), used by the front door to classify the protocol.
pub fn is_resp_tag(bytes: &[u8]) -> bool {
    bytes.first() == Some(&b'*')
}

/// Build the front-door detector for the RESP handler
pub fn resp_detector(handler: Arc<RespHandler>) -> Detector {
    Detector {
        needed: 1,
        test: is_resp_tag,
        handler,
    }
}

/// RESP handler over a source registry
pub struct RespHandler {
    registry: Arc<SourceRegistry>,
}

impl RespHandler {
    /// Create a handler
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self { registry }
    }

    async fn run_command<R: AsyncRead + Unpin + Send>(
        &self,
        args: &[String],
        reader: &mut BufReader<R>,
        writer: &mut OwnedWriteHalf,
    ) -> io::Result<bool> {
        let command = args[0].to_lowercase();
        match command.as_str() {
            "ping" => {
                writer.write_all(b"+PONG\r\n").await?;
                Ok(true)
            }
            "quit" => {
                writer.write_all(b"+OK\r\n").await?;
                Ok(false)
            }
            "ls" => {
                let names = self.registry.names();
                write_array(writer, &names).await?;
                Ok(true)
            }
            "get" => {
                if args.len() < 2 {
                    write_error(writer, "usage: get <source> [format]").await?;
                    return Ok(true);
                }
                let format = args.get(2).map(String::as_str).unwrap_or("json");
                match self.registry.get(&args[1]) {
                    None => write_error(writer, "no such source").await?,
                    Some(mux) => {
                        let mut body = Vec::new();
                        match mux.get(format, &mut body) {
                            Ok(()) => write_bulk(writer, &body).await?,
                            Err(err) => write_error(writer, &err.to_string()).await?,
                        }
                    }
                }
                Ok(true)
            }
            "watch" => {
                if args.len() < 2 {
                    write_error(writer, "usage: watch <source> [format]").await?;
                    return Ok(true);
                }
                let format = args.get(2).map(String::as_str).unwrap_or("json");
                let Some(mux) = self.registry.get(&args[1]) else {
                    write_error(writer, "no such source").await?;
                    return Ok(true);
                };
                self.stream_watch(&mux, format, reader, writer).await?;
                // The watch owns the connection until it ends
                Ok(false)
            }
            other => {
                write_error(writer, &format!("unknown command '{other}'")).await?;
                Ok(true)
            }
        }
    }

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
            return write_error(writer, &err.to_string()).await;
        }
        metrics::record_watch_opened("resp");
        let mut result = writer.write_all(b"+OK\r\n").await;

        let mut scratch = Vec::new();
        let mut probe = [0u8; 512];
        while result.is_ok() {
            tokio::select! {
                ready = ready_rx.recv() => {
                    let Some(ready) = ready else { break };
                    ready.drain_into(&mut scratch);
                    result = writer.write_all(&scratch).await;
                }
                read = reader.read(&mut probe) => match read {
                    // Anything further from the client ends the watch
                    Ok(0) | Err(_) => break,
                    Ok(_) => break,
                },
            }
        }

        buffer.close();
        metrics::record_watch_closed("resp");
        result
    }
}

#[async_trait]
impl ConnectionHandler for RespHandler {
    async fn handle(&self, stream: InboundStream, peer: SocketAddr) -> io::Result<()> {
        metrics::record_connection("resp");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        loop {
            let Some(args) = read_command(&mut reader).await? else {
                break;
            };
            if args.is_empty() {
                continue;
            }
            trace!(%peer, command = %args[0], "resp command");
            if !self.run_command(&args, &mut reader, &mut write_half).await? {
                break;
            }
        }
        write_half.shutdown().await
    }
}

/// Read one command as its argument list.
///
/// `Ok(None)` means the client closed the connection; an empty vec means
/// a blank line to skip. Array and bulk lengths are client-controlled,
/// so both are bounded before anything is allocated from them.
async fn read_command<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> io::Result<Option<Vec<String>>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Ok(Some(Vec::new()));
    }

    let Some(count) = line.strip_prefix('*') else {
        // Inline command form
        return Ok(Some(line.split_whitespace().map(str::to_string).collect()));
    };
    let count: usize = count
        .parse()
        .ok()
        .filter(|count| *count <= MAX_COMMAND_ARGS)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad array header"))?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let mut header = String::new();
        if reader.read_line(&mut header).await? == 0 {
            return Ok(None);
        }
        let len: usize = header
            .trim_end_matches(['\r', '\n'])
            .strip_prefix('$')
            .and_then(|n| n.parse().ok())
            .filter(|len| *len <= MAX_BULK_LEN)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad bulk header"))?;

        // Payload plus trailing CRLF
        let mut payload = vec![0u8; len + 2];
        reader.read_exact(&mut payload).await?;
        payload.truncate(len);
        args.push(String::from_utf8_lossy(&payload).into_owned());
    }
    Ok(Some(args))
}

async fn write_error(writer: &mut OwnedWriteHalf, message: &str) -> io::Result<()> {
    writer
        .write_all(format!("-ERR {message}\r\n").as_bytes())
        .await
}

async fn write_bulk(writer: &mut OwnedWriteHalf, data: &[u8]) -> io::Result<()> {
    writer
        .write_all(format!("${}\r\n", data.len()).as_bytes())
        .await?;
    writer.write_all(data).await?;
    writer.write_all(b"\r\n").await
}

async fn write_array(writer: &mut OwnedWriteHalf, items: &[String]) -> io::Result<()> {
    writer
        .write_all(format!("*{}\r\n", items.len()).as_bytes())
        .await?;
    for item in items {
        write_bulk(writer, item.as_bytes()).await?;
    }
    Ok(())
}
