// TCP listener and accept loop.
//
// Architecture: one thread per connection.
//
// - **Accept thread**: polls a non-blocking `TcpListener`, sleeping briefly
//   when nothing is pending so it can notice `ServerHandle::stop`. Each
//   accepted stream is switched back to blocking mode and handed to a fresh
//   connection thread. The accept loop never waits on a connection.
// - **Connection threads**: run `connection::serve_stream` to completion and
//   exit. They share the catalogue store, session registry, and roster sink
//   through one `Arc<ConnectionContext>`.
//
// Admission control is optional: with `max_connections` set, a connection
// that would exceed the limit is closed immediately after accept. The default
// is unbounded.
//
// Shutdown stops the accept thread only; connections already in progress run
// to completion (or until their I/O timeout, if one is configured).

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use pokeparty_protocol::MAX_FRAME_SIZE;
use tracing::{debug, error, info, warn};

use crate::catalogue_store::CatalogueStore;
use crate::connection::{ConnectionContext, serve_stream};
use crate::registry::SessionRegistry;
use crate::roster_store::RosterSink;

/// How long the accept thread sleeps when no connection is pending.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for starting a server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to listen on. Port 0 lets the OS pick a free port.
    pub listen_addr: String,
    /// Catalogue document read at startup.
    pub catalogue_path: PathBuf,
    /// Directory receiving `<name>.json` roster files.
    pub roster_dir: PathBuf,
    /// Largest selection frame accepted from a client.
    pub max_frame_size: u32,
    /// Read/write timeout applied to every connection. `None` waits forever.
    pub io_timeout: Option<Duration>,
    /// Maximum simultaneous connections. `None` is unbounded.
    pub max_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            catalogue_path: PathBuf::from("pokedex.json"),
            roster_dir: PathBuf::from("."),
            max_frame_size: MAX_FRAME_SIZE,
            io_timeout: None,
            max_connections: None,
        }
    }
}

/// Handle returned by `start_server` to observe and stop the running server.
pub struct ServerHandle {
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    active: Arc<AtomicUsize>,
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// The bound address (useful when port 0 was requested).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// The registry every connection appends to.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Number of connection threads currently running.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Block until the accept thread exits. It only exits after `stop`, or
    /// if the listener fails.
    pub fn wait(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// Stop accepting connections and wait for the accept thread to exit.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        info!(addr = %self.addr, "server stopped");
    }
}

/// Bind the listener and start the accept thread. The catalogue must already
/// be loaded; the server never reloads it.
pub fn start_server(
    config: &ServerConfig,
    store: Arc<CatalogueStore>,
    sink: Arc<dyn RosterSink>,
) -> std::io::Result<(ServerHandle, SocketAddr)> {
    let listener = TcpListener::bind(&config.listen_addr)?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let registry = Arc::new(SessionRegistry::new());
    let ctx = Arc::new(ConnectionContext {
        store,
        registry: Arc::clone(&registry),
        sink,
        max_frame_size: config.max_frame_size,
    });
    let keep_running = Arc::new(AtomicBool::new(true));
    let active = Arc::new(AtomicUsize::new(0));

    let acceptor = Acceptor {
        listener,
        ctx,
        keep_running: Arc::clone(&keep_running),
        active: Arc::clone(&active),
        io_timeout: config.io_timeout,
        max_connections: config.max_connections,
    };
    let thread = thread::Builder::new()
        .name("accept".into())
        .spawn(move || acceptor.run())?;

    info!(%addr, "server listening");
    let handle = ServerHandle {
        addr,
        registry,
        active,
        keep_running,
        thread: Some(thread),
    };
    Ok((handle, addr))
}

struct Acceptor {
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
    keep_running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    io_timeout: Option<Duration>,
    max_connections: Option<usize>,
}

impl Acceptor {
    fn run(self) {
        while self.keep_running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    // Per-connection accept failures (e.g. the peer reset
                    // before accept) don't take the listener down.
                    warn!(error = %e, "failed to accept connection");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
        debug!("accept loop exited");
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        let Some(guard) = ActiveGuard::try_acquire(&self.active, self.max_connections) else {
            warn!(%peer, limit = ?self.max_connections, "connection limit reached; refusing");
            return;
        };
        if let Err(e) = stream.set_nonblocking(false) {
            warn!(%peer, error = %e, "failed to configure accepted stream");
            return;
        }

        let ctx = Arc::clone(&self.ctx);
        let io_timeout = self.io_timeout;
        let spawned = thread::Builder::new()
            .name(format!("conn-{}", peer.port()))
            .spawn(move || {
                let _guard = guard;
                serve_stream(stream, &ctx, io_timeout);
            });
        if let Err(e) = spawned {
            error!(%peer, error = %e, "failed to spawn connection thread");
        }
    }
}

/// Counts a running connection for as long as it is alive.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn try_acquire(active: &Arc<AtomicUsize>, limit: Option<usize>) -> Option<Self> {
        let admitted = active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match limit {
                Some(max) if n >= max => None,
                _ => Some(n + 1),
            })
            .is_ok();
        admitted.then(|| Self(Arc::clone(active)))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_respects_limit_and_releases() {
        let active = Arc::new(AtomicUsize::new(0));
        let a = ActiveGuard::try_acquire(&active, Some(2)).unwrap();
        let _b = ActiveGuard::try_acquire(&active, Some(2)).unwrap();
        assert!(ActiveGuard::try_acquire(&active, Some(2)).is_none());
        assert_eq!(active.load(Ordering::SeqCst), 2);

        drop(a);
        assert_eq!(active.load(Ordering::SeqCst), 1);
        assert!(ActiveGuard::try_acquire(&active, Some(2)).is_some());
    }

    #[test]
    fn unbounded_guard_always_admits() {
        let active = Arc::new(AtomicUsize::new(0));
        let guards: Vec<_> = (0..100)
            .map(|_| ActiveGuard::try_acquire(&active, None).unwrap())
            .collect();
        assert_eq!(active.load(Ordering::SeqCst), 100);
        drop(guards);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_config_matches_legacy_port() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.max_frame_size, MAX_FRAME_SIZE);
        assert!(config.max_connections.is_none());
    }
}
