//! Two-phase server lifecycle
//!
//! Handler registration happens on a [`ServerBuilder`] before any
//! listener exists; [`ServerBuilder::start`] binds and returns a
//! [`RunningServer`]. A [`ServerHandle`] is an indirect reference that
//! handlers constructed pre-start can hold; its operations fail with
//! `NoServerConfigured` until `start` completes.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use contracts::WatchError;

use crate::detect::{dispatch, ConnectionHandler, Detector};

#[derive(Clone)]
struct Configured {
    local_addr: SocketAddr,
    shutdown: mpsc::UnboundedSender<()>,
}

/// Settable-later reference to a listening server.
///
/// Lets handler registration happen before the server address is known,
/// breaking the route-registration / listener-creation ordering cycle.
#[derive(Clone, Default)]
pub struct ServerHandle {
    inner: Arc<Mutex<Option<Configured>>>,
}

impl ServerHandle {
    /// Create an unconfigured handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a running server has been attached
    pub fn is_configured(&self) -> bool {
        self.inner.lock().unwrap().is_some()
    }

    /// Bound address of the attached server
    ///
    /// # Errors
    /// `NoServerConfigured` before `start`.
    pub fn local_addr(&self) -> Result<SocketAddr, WatchError> {
        self.inner
            .lock()
            .unwrap()
            .as_ref()
            .map(|c| c.local_addr)
            .ok_or(WatchError::NoServerConfigured)
    }

    /// Signal the attached server's accept loop to stop
    ///
    /// # Errors
    /// `NoServerConfigured` before `start`.
    pub fn stop(&self) -> Result<(), WatchError> {
        let inner = self.inner.lock().unwrap();
        let configured = inner.as_ref().ok_or(WatchError::NoServerConfigured)?;
        let _ = configured.shutdown.send(());
        Ok(())
    }

    fn configure(&self, configured: Configured) {
        *self.inner.lock().unwrap() = Some(configured);
    }
}

/// Builder holding handler registrations until the listener is started
pub struct ServerBuilder {
    detectors: Vec<Detector>,
    default_handler: Arc<dyn ConnectionHandler>,
    handle: ServerHandle,
}

impl ServerBuilder {
    /// Create a builder with the default (fall-through) handler
    pub fn new(default_handler: Arc<dyn ConnectionHandler>) -> Self {
        Self {
            detectors: Vec::new(),
            default_handler,
            handle: ServerHandle::new(),
        }
    }

    /// Register a detected protocol handler. Detectors are tried in
    /// registration order.
    pub fn detect(mut self, detector: Detector) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Adopt an existing handle instead of the builder's own, so the
    /// default handler itself can hold a reference to the server it
    /// will run inside.
    pub fn with_handle(mut self, handle: ServerHandle) -> Self {
        self.handle = handle;
        self
    }

    /// Indirect handle to the eventual server, usable before `start`
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Bind and start the accept loop.
    ///
    /// Fills every handle cloned from this builder, then serves until
    /// stopped.
    pub async fn start(self, addr: impl ToSocketAddrs) -> Result<RunningServer, WatchError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();

        self.handle.configure(Configured {
            local_addr,
            shutdown: shutdown_tx.clone(),
        });
        info!(addr = %local_addr, detectors = self.detectors.len(), "server listening");

        let detectors = Arc::new(self.detectors);
        let default_handler = self.default_handler;
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            spawn_connection(stream, peer, Arc::clone(&detectors), Arc::clone(&default_handler));
                        }
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                        }
                    }
                }
            }
            info!(addr = %local_addr, "server stopped");
        });

        Ok(RunningServer {
            local_addr,
            shutdown: shutdown_tx,
            task,
            handle: self.handle,
        })
    }
}

fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    detectors: Arc<Vec<Detector>>,
    default_handler: Arc<dyn ConnectionHandler>,
) {
    tokio::spawn(async move {
        if let Err(err) = dispatch(stream, peer, &detectors, &default_handler).await {
            debug!(%peer, error = %err, "connection ended with error");
        }
    });
}

/// A started server: bound address plus accept-loop task
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
    handle: ServerHandle,
}

impl RunningServer {
    /// Bound listen address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Indirect handle to this server
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Stop the accept loop and wait for it to finish.
    ///
    /// Connections already dispatched run to completion on their own
    /// tasks.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }

    /// Wait for the accept loop to finish without stopping it
    pub async fn join(self) {
        let _ = self.task.await;
    }
}
