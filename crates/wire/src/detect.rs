//! Protocol auto-detection front door
//!
//! Classifies a freshly accepted connection by its leading bytes and
//! dispatches it to the matching protocol handler, or to the default
//! handler. The classification bytes are consumed from the socket and
//! re-attached in front of the stream handed over, so every handler
//! reads the connection from byte 0.

use std::io::{self, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::trace;

/// Read side of an [`InboundStream`]: the classification bytes chained
/// in front of the socket's read half.
pub type InboundReader = tokio::io::Chain<Cursor<Vec<u8>>, OwnedReadHalf>;

/// An accepted connection whose leading bytes may already have been
/// consumed during classification.
pub struct InboundStream {
    leading: Vec<u8>,
    stream: TcpStream,
}

impl InboundStream {
    /// Wrap a raw stream with no consumed bytes
    pub fn new(stream: TcpStream) -> Self {
        Self {
            leading: Vec::new(),
            stream,
        }
    }

    fn with_leading(leading: Vec<u8>, stream: TcpStream) -> Self {
        Self { leading, stream }
    }

    /// Split into read and write halves. The read half yields the
    /// classification bytes first, then the rest of the socket.
    pub fn into_split(self) -> (InboundReader, OwnedWriteHalf) {
        let (read_half, write_half) = self.stream.into_split();
        (Cursor::new(self.leading).chain(read_half), write_half)
    }
}

/// Per-connection protocol handler
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Handle one connection to completion
    async fn handle(&self, stream: InboundStream, peer: SocketAddr) -> io::Result<()>;
}

/// Predicate over the first `needed` bytes of a stream
pub type DetectFn = fn(&[u8]) -> bool;

/// A protocol handler keyed by a detection predicate
pub struct Detector {
    /// Leading bytes required to classify
    pub needed: usize,
    /// Classification predicate, applied to exactly `needed` bytes
    pub test: DetectFn,
    /// Handler receiving matched connections
    pub handler: Arc<dyn ConnectionHandler>,
}

/// Route one accepted connection to a handler.
///
/// Reads up to the largest `needed` window off the socket, waiting for
/// a tag that arrives split across segments, and stopping early at EOF
/// or a read error. A detector whose window was not filled does not
/// match; the first matching detector wins and no match falls through
/// to the default handler. There is no "unknown protocol" terminal
/// state, misclassification surfaces only as a downstream protocol
/// parse failure. Whatever was read here is re-attached in front of the
/// stream the handler receives.
pub async fn dispatch(
    mut stream: TcpStream,
    peer: SocketAddr,
    detectors: &[Detector],
    default: &Arc<dyn ConnectionHandler>,
) -> io::Result<()> {
    let window = detectors.iter().map(|d| d.needed).max().unwrap_or(0);
    let mut leading = vec![0u8; window];
    let mut filled = 0;
    while filled < window {
        match stream.read(&mut leading[filled..]).await {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    leading.truncate(filled);

    for detector in detectors {
        if filled >= detector.needed && (detector.test)(&leading[..detector.needed]) {
            trace!(%peer, needed = detector.needed, "connection matched detector");
            return detector
                .handler
                .handle(InboundStream::with_leading(leading, stream), peer)
                .await;
        }
    }
    trace!(%peer, "connection routed to default handler");
    default
        .handle(InboundStream::with_leading(leading, stream), peer)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Handler that records how often it ran and reads the full stream
    struct RecordingHandler {
        hits: Arc<AtomicUsize>,
        seen: Arc<std::sync::Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl ConnectionHandler for RecordingHandler {
        async fn handle(&self, stream: InboundStream, _peer: SocketAddr) -> io::Result<()> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            let (mut reader, _writer) = stream.into_split();
            let mut data = Vec::new();
            reader.read_to_end(&mut data).await?;
            self.seen.lock().unwrap().extend_from_slice(&data);
            Ok(())
        }
    }

    fn recording() -> (Arc<RecordingHandler>, Arc<AtomicUsize>, Arc<std::sync::Mutex<Vec<u8>>>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let handler = Arc::new(RecordingHandler {
            hits: Arc::clone(&hits),
            seen: Arc::clone(&seen),
        });
        (handler, hits, seen)
    }

    fn star_tag(bytes: &[u8]) -> bool {
        bytes.first() == Some(&b'*')
    }

    fn sync_tag(bytes: &[u8]) -> bool {
        bytes == b"SYNC"
    }

    async fn run_one(payload: &[u8]) -> (usize, Vec<u8>, usize, Vec<u8>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (matched, matched_hits, matched_seen) = recording();
        let (fallback, fallback_hits, fallback_seen) = recording();
        let detectors = vec![Detector {
            needed: 1,
            test: star_tag,
            handler: matched,
        }];
        let default: Arc<dyn ConnectionHandler> = fallback;

        let client = tokio::spawn({
            let payload = payload.to_vec();
            async move {
                let mut conn = TcpStream::connect(addr).await.unwrap();
                conn.write_all(&payload).await.unwrap();
                conn.shutdown().await.unwrap();
            }
        });

        let (stream, peer) = listener.accept().await.unwrap();
        dispatch(stream, peer, &detectors, &default).await.unwrap();
        client.await.unwrap();

        let matched_bytes = matched_seen.lock().unwrap().clone();
        let fallback_bytes = fallback_seen.lock().unwrap().clone();
        (
            matched_hits.load(Ordering::SeqCst),
            matched_bytes,
            fallback_hits.load(Ordering::SeqCst),
            fallback_bytes,
        )
    }

    #[tokio::test]
    async fn test_tagged_connection_routed_with_bytes_intact() {
        let (matched, seen, fallback, _) = run_one(b"*1\r\nls\r\n").await;
        assert_eq!(matched, 1);
        assert_eq!(fallback, 0);
        // The classification byte is still at the front of the stream
        assert_eq!(seen, b"*1\r\nls\r\n");
    }

    #[tokio::test]
    async fn test_untagged_connection_falls_through_intact() {
        let (matched, _, fallback, seen) = run_one(b"GET / HTTP/1.1\r\n\r\n").await;
        assert_eq!(matched, 0);
        assert_eq!(fallback, 1);
        assert_eq!(seen, b"GET / HTTP/1.1\r\n\r\n");
    }

    #[tokio::test]
    async fn test_immediate_eof_falls_through() {
        let (matched, _, fallback, seen) = run_one(b"").await;
        assert_eq!(matched, 0);
        assert_eq!(fallback, 1);
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn test_split_tag_arrival_still_matches() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (matched, matched_hits, matched_seen) = recording();
        let (fallback, fallback_hits, _) = recording();
        let detectors = vec![Detector {
            needed: 4,
            test: sync_tag,
            handler: matched,
        }];
        let default: Arc<dyn ConnectionHandler> = fallback;

        // The tag crosses a segment boundary: the front door must keep
        // reading until the full window is in hand
        let client = tokio::spawn(async move {
            let mut conn = TcpStream::connect(addr).await.unwrap();
            conn.write_all(b"SY").await.unwrap();
            conn.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            conn.write_all(b"NC hello").await.unwrap();
            conn.shutdown().await.unwrap();
        });

        let (stream, peer) = listener.accept().await.unwrap();
        dispatch(stream, peer, &detectors, &default).await.unwrap();
        client.await.unwrap();

        assert_eq!(matched_hits.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_hits.load(Ordering::SeqCst), 0);
        let seen = matched_seen.lock().unwrap().clone();
        assert_eq!(seen, b"SYNC hello");
    }

    #[tokio::test]
    async fn test_eof_before_window_falls_through_with_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (matched, matched_hits, _) = recording();
        let (fallback, fallback_hits, fallback_seen) = recording();
        let detectors = vec![Detector {
            needed: 4,
            test: sync_tag,
            handler: matched,
        }];
        let default: Arc<dyn ConnectionHandler> = fallback;

        let client = tokio::spawn(async move {
            let mut conn = TcpStream::connect(addr).await.unwrap();
            conn.write_all(b"SY").await.unwrap();
            conn.shutdown().await.unwrap();
        });

        let (stream, peer) = listener.accept().await.unwrap();
        dispatch(stream, peer, &detectors, &default).await.unwrap();
        client.await.unwrap();

        assert_eq!(matched_hits.load(Ordering::SeqCst), 0);
        assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
        let seen = fallback_seen.lock().unwrap().clone();
        assert_eq!(seen, b"SY");
    }
}
