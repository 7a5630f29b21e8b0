//! CoalescingBuffer - notify-once byte buffer between producer and
//! writer loop
//!
//! Fan-out writes land here synchronously; a connection's writer loop
//! drains in batches, triggered by the ready channel. The producer never
//! blocks on socket I/O, and the channel carries at most one message per
//! pending period no matter how many writes arrive.

use std::io;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use contracts::WatchError;

/// Sending side of a connection's ready channel
pub type ReadySender = mpsc::UnboundedSender<Arc<CoalescingBuffer>>;
/// Receiving side of a connection's ready channel
pub type ReadyReceiver = mpsc::UnboundedReceiver<Arc<CoalescingBuffer>>;

struct Inner {
    buf: Vec<u8>,
    pending: bool,
    closed: bool,
}

/// In-memory byte buffer that merges concurrent small writes and
/// notifies the consumer exactly once per idle-to-pending transition.
///
/// All mutations are serialized under one mutex per instance. `push` may
/// be called concurrently from any number of producer paths; `drain_into`
/// is called by exactly one consumer.
pub struct CoalescingBuffer {
    inner: Mutex<Inner>,
    ready: ReadySender,
}

impl CoalescingBuffer {
    /// Create a buffer notifying on the given ready channel.
    ///
    /// Several buffers may share one channel; the message carries the
    /// buffer that became ready.
    pub fn new(ready: ReadySender) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                buf: Vec::new(),
                pending: false,
                closed: false,
            }),
            ready,
        })
    }

    /// Create a ready channel for one consumer loop
    pub fn ready_channel() -> (ReadySender, ReadyReceiver) {
        mpsc::unbounded_channel()
    }

    /// Append bytes to the buffer.
    ///
    /// If this append transitions the buffer from idle to pending, a
    /// reference to the buffer is sent on the ready channel exactly
    /// once; subsequent pushes before the next drain do not re-notify.
    ///
    /// # Errors
    /// `WatchError::BufferClosed` after [`close`](Self::close).
    pub fn push(self: &Arc<Self>, bytes: &[u8]) -> Result<usize, WatchError> {
        let send = {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return Err(WatchError::BufferClosed);
            }
            inner.buf.extend_from_slice(bytes);
            if !bytes.is_empty() && !inner.pending {
                inner.pending = true;
                true
            } else {
                false
            }
        };
        // Notification happens outside the lock. A dropped receiver
        // means the connection is gone; close() follows shortly.
        if send {
            let _ = self.ready.send(Arc::clone(self));
        }
        Ok(bytes.len())
    }

    /// Move the buffered content into `out` (cleared first, allocation
    /// reused) and clear the pending flag, so the next push re-triggers
    /// a notification.
    pub fn drain_into(&self, out: &mut Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        out.clear();
        out.extend_from_slice(&inner.buf);
        inner.buf.clear();
        inner.pending = false;
    }

    /// Bytes currently awaiting drain
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().buf.len()
    }

    /// Whether no bytes await drain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail all future pushes. Already-buffered bytes stay drainable.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }

    /// Whether the buffer has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

/// Adapts a [`CoalescingBuffer`] to `std::io::Write`, making it a
/// `SinkWriter` the frame fan-out can hold.
pub struct BufferWriter {
    buffer: Arc<CoalescingBuffer>,
}

impl BufferWriter {
    /// Wrap a buffer
    pub fn new(buffer: Arc<CoalescingBuffer>) -> Self {
        Self { buffer }
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .push(buf)
            .map_err(|err| io::Error::new(io::ErrorKind::BrokenPipe, err))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
