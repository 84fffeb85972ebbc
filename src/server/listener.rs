//! Proxy listener and connection tracking.
//!
//! One accept loop per server, one task per TCP connection. Every task is
//! tracked by [`ConnectionId`] so a drain can close them all once the last
//! admitted request has finished.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──► listen() ──► (loop driven, requests served) ──► flush() ──► closed
//!              │                                              │
//!              └─ idempotent                                  └─ idempotent
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::event_loop::EventLoop;
use crate::identifiers::ConnectionId;

use super::config::ProxyConfig;
use super::dispatch;
use super::in_flight::InFlight;
use super::kernel::Kernel;

// ============================================================================
// Constants
// ============================================================================

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// How long a connection may take to finish its current exchange once the
/// drain closes it.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ============================================================================
// ServerState
// ============================================================================

/// State shared between the server handle, the accept loop and every
/// connection task.
pub(crate) struct ServerState {
    /// Listener configuration.
    pub(crate) config: ProxyConfig,

    /// Application kernel.
    pub(crate) kernel: Arc<dyn Kernel>,

    /// Admitted, unfinished requests.
    pub(crate) in_flight: InFlight,

    /// Concurrent request cap.
    pub(crate) admission: Semaphore,

    /// Live connection tasks.
    connections: Mutex<FxHashMap<ConnectionId, JoinHandle<()>>>,

    /// Set once, when the drain starts.
    draining: AtomicBool,

    /// Flipped to `true` when live connections must wind down.
    shutdown: watch::Sender<bool>,
}

impl ServerState {
    fn new(config: ProxyConfig, kernel: Arc<dyn Kernel>) -> Self {
        Self {
            admission: Semaphore::new(config.admission_permits()),
            config,
            kernel,
            in_flight: InFlight::default(),
            connections: Mutex::new(FxHashMap::default()),
            draining: AtomicBool::new(false),
            shutdown: watch::Sender::new(false),
        }
    }

    #[inline]
    fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Removes every tracked connection, aborting its task.
    fn abort_connections(&self) -> Vec<JoinHandle<()>> {
        let connections: Vec<_> = {
            let mut map = self.connections.lock();
            map.drain().collect()
        };

        connections
            .into_iter()
            .map(|(id, handle)| {
                handle.abort();
                trace!(connection = %id, "Connection aborted");
                handle
            })
            .collect()
    }

    /// Tells every connection to stop taking new requests.
    ///
    /// Idle keep-alive connections close at once; busy ones finish the
    /// exchange they are in, then close.
    fn wind_down_connections(&self) {
        self.shutdown.send_replace(true);
    }

    /// Closes every tracked connection and waits for the tasks to unwind.
    ///
    /// Any connection still open after [`CLOSE_GRACE`] is aborted.
    async fn close_connections(&self) {
        self.wind_down_connections();

        let handles: Vec<_> = {
            let mut map = self.connections.lock();
            map.drain().collect()
        };
        let count = handles.len();

        for (id, mut handle) in handles {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                warn!(connection = %id, "Connection did not close in time, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }

        debug!(count, "Connections closed");
    }
}

// ============================================================================
// ServerState - Accept Loop
// ============================================================================

impl ServerState {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener, local_addr: SocketAddr) {
        debug!(%local_addr, "Accept loop started");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    if self.is_draining() {
                        debug!(%peer, "Connection refused while draining");
                        drop(stream);
                        continue;
                    }

                    let id = ConnectionId::next();
                    let state = Arc::clone(&self);
                    let handle = tokio::spawn(async move {
                        state.serve_connection(id, stream, peer, local_addr).await;
                    });

                    if !handle.is_finished() {
                        self.connections.lock().insert(id, handle);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    /// Serves HTTP/1.1 on one connection until the peer hangs up.
    async fn serve_connection(
        self: Arc<Self>,
        id: ConnectionId,
        stream: TcpStream,
        peer: SocketAddr,
        local_addr: SocketAddr,
    ) {
        debug!(connection = %id, %peer, "Connection accepted");

        let state = Arc::clone(&self);
        let service = service_fn(move |request| {
            dispatch::handle(Arc::clone(&state), peer, local_addr, request)
        });

        let mut shutdown = self.shutdown.subscribe();
        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        let outcome = tokio::select! {
            outcome = connection.as_mut() => outcome,
            () = async {
                let _ = shutdown.wait_for(|closing| *closing).await;
            } => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        };

        if let Err(e) = outcome {
            debug!(connection = %id, error = %e, "Connection ended with error");
        }

        self.connections.lock().remove(&id);
        trace!(connection = %id, "Connection closed");
    }
}

// ============================================================================
// ProxyServer
// ============================================================================

/// Address and accept task of a bound listener.
struct Bound {
    addr: SocketAddr,
    accept_task: Option<JoinHandle<()>>,
}

/// Embedded HTTP server fronting an application kernel.
///
/// All work happens on the shared [`EventLoop`]: requests are only served
/// while some caller drives the loop, typically a command call waiting on
/// the browser.
///
/// Dropping the server flushes it.
///
/// # Example
///
/// ```ignore
/// let event_loop = EventLoop::new()?;
/// let server = ProxyServer::new(kernel, event_loop.clone(), ProxyConfig::default());
/// let addr = server.listen()?;
///
/// // ... drive browser traffic ...
///
/// server.flush()?;
/// ```
pub struct ProxyServer {
    /// State shared with the loop tasks.
    state: Arc<ServerState>,

    /// Loop the server runs on.
    event_loop: EventLoop,

    /// Set by the first successful `listen()`.
    bound: Mutex<Option<Bound>>,
}

impl std::fmt::Debug for ProxyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyServer")
            .field("local_addr", &self.local_addr())
            .field("in_flight", &self.in_flight())
            .field("connections", &self.connection_count())
            .field("draining", &self.is_draining())
            .finish()
    }
}

// ============================================================================
// ProxyServer - Constructor
// ============================================================================

impl ProxyServer {
    /// Creates an unbound server.
    #[must_use]
    pub fn new(kernel: impl Kernel, event_loop: EventLoop, config: ProxyConfig) -> Self {
        Self {
            state: Arc::new(ServerState::new(config, Arc::new(kernel))),
            event_loop,
            bound: Mutex::new(None),
        }
    }
}

// ============================================================================
// ProxyServer - Public API
// ============================================================================

impl ProxyServer {
    /// Binds the listening socket and schedules the accept loop.
    ///
    /// Returns immediately; connections are accepted as the loop is driven.
    /// Calling again on a bound server returns the existing address.
    ///
    /// # Errors
    ///
    /// - [`Error::ServerClosed`] if the server has been flushed
    /// - [`Error::Io`] if binding fails
    pub fn listen(&self) -> Result<SocketAddr> {
        if self.is_draining() {
            return Err(Error::ServerClosed);
        }

        let mut bound = self.bound.lock();
        if let Some(bound) = bound.as_ref() {
            return Ok(bound.addr);
        }

        let config = &self.state.config;
        let std_listener = std::net::TcpListener::bind((config.host.as_str(), config.port))?;
        std_listener.set_nonblocking(true)?;
        let addr = std_listener.local_addr()?;

        let listener = {
            let _guard = self.event_loop.enter();
            TcpListener::from_std(std_listener)?
        };

        let state = Arc::clone(&self.state);
        let accept_task = self.event_loop.spawn(state.accept_loop(listener, addr));

        info!(
            %addr,
            max_concurrent_requests = config.max_concurrent_requests,
            max_body_bytes = config.max_body_bytes,
            "Proxy server listening"
        );

        *bound = Some(Bound {
            addr,
            accept_task: Some(accept_task),
        });

        Ok(addr)
    }

    /// Returns the bound address, if listening has started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.lock().as_ref().map(|bound| bound.addr)
    }

    /// Returns the published base URL, `http://host:port/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the server is not listening.
    pub fn url(&self) -> Result<Url> {
        let addr = self
            .local_addr()
            .ok_or_else(|| Error::config("proxy server is not listening"))?;

        Url::parse(&format!("http://{addr}/"))
            .map_err(|e| Error::config(format!("unusable listener address {addr}: {e}")))
    }

    /// Returns the number of admitted, unfinished requests.
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.count()
    }

    /// Returns the number of open connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.connections.lock().len()
    }

    /// Returns `true` once a flush has started.
    #[inline]
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.state.is_draining()
    }

    /// Returns the loop this server runs on.
    #[inline]
    #[must_use]
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }
}

// ============================================================================
// ProxyServer - Lifecycle
// ============================================================================

impl ProxyServer {
    /// Drains the server and releases its sockets.
    ///
    /// Drives the loop until no request is in flight, polling every
    /// `drain_interval`, then closes all connections and the listening
    /// socket. New connections are refused as soon as the drain starts, and
    /// open connections stop taking new requests: idle keep-alive
    /// connections close right away. Calling `flush` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopReentered`] when called from inside the loop. The
    /// server still stops: its tasks are aborted without waiting.
    pub fn flush(&self) -> Result<()> {
        if self.state.draining.swap(true, Ordering::SeqCst) {
            trace!("Flush skipped, already draining");
            return Ok(());
        }

        let accept_task = self
            .bound
            .lock()
            .as_mut()
            .and_then(|bound| bound.accept_task.take());

        let Some(accept_task) = accept_task else {
            debug!("Flush on a server that never listened");
            return Ok(());
        };

        info!(in_flight = self.in_flight(), "Proxy server draining");
        self.state.wind_down_connections();

        let accept_abort = accept_task.abort_handle();
        let state = Arc::clone(&self.state);

        let drained = self.event_loop.drive(async move {
            let mut ticker = tokio::time::interval(state.config.drain_period());
            while state.in_flight.count() > 0 {
                ticker.tick().await;
            }

            accept_task.abort();
            let _ = accept_task.await;
            state.close_connections().await;
        });

        if let Err(e) = drained {
            warn!(error = %e, "Drain could not drive the loop, aborting tasks");
            accept_abort.abort();
            self.state.abort_connections();
            return Err(e);
        }

        info!("Proxy server closed");
        Ok(())
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        if self.is_draining() {
            return;
        }

        if let Err(e) = self.flush() {
            warn!(error = %e, "Flush on drop failed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write};

    use crate::server::{AppRequest, AppResponse, KernelError};

    fn echo_kernel() -> impl Kernel {
        |req: &AppRequest| -> std::result::Result<AppResponse, KernelError> {
            Ok(AppResponse::ok(req.path().to_string()))
        }
    }

    fn server() -> ProxyServer {
        let event_loop = EventLoop::new().expect("loop");
        ProxyServer::new(echo_kernel(), event_loop, ProxyConfig::default())
    }

    #[test]
    fn test_listen_is_idempotent() {
        let server = server();
        let first = server.listen().expect("listen");
        let second = server.listen().expect("listen again");

        assert_eq!(first, second);
        assert!(first.port() > 0);
        assert_eq!(server.local_addr(), Some(first));
        server.flush().expect("flush");
    }

    #[test]
    fn test_url_format() {
        let server = server();
        assert!(server.url().is_err());

        let addr = server.listen().expect("listen");
        assert_eq!(
            server.url().expect("url").as_str(),
            format!("http://127.0.0.1:{}/", addr.port())
        );
    }

    #[test]
    fn test_flush_is_idempotent_and_closes() {
        let server = server();
        server.listen().expect("listen");

        server.flush().expect("flush");
        assert!(server.is_draining());
        assert_eq!(server.connection_count(), 0);

        server.flush().expect("second flush");
        assert!(matches!(server.listen(), Err(Error::ServerClosed)));
    }

    #[test]
    fn test_flush_without_listen() {
        let server = server();
        server.flush().expect("flush");
        assert!(matches!(server.listen(), Err(Error::ServerClosed)));
    }

    #[test]
    fn test_flush_inside_loop_aborts() {
        let server = Arc::new(server());
        server.listen().expect("listen");

        let inner = Arc::clone(&server);
        let result = server
            .event_loop()
            .clone()
            .drive(async move { inner.flush() })
            .expect("drive");

        assert!(matches!(result, Err(Error::LoopReentered)));
        assert!(server.is_draining());
    }

    #[test]
    fn test_zero_drain_interval_still_flushes() {
        let event_loop = EventLoop::new().expect("loop");
        let config = ProxyConfig {
            drain_interval: Duration::ZERO,
            ..ProxyConfig::default()
        };
        let server = ProxyServer::new(echo_kernel(), event_loop, config);
        server.listen().expect("listen");

        server.flush().expect("flush");
        assert!(server.is_draining());
    }

    #[test]
    fn test_oversized_cap_is_clamped() {
        let event_loop = EventLoop::new().expect("loop");
        let config = ProxyConfig {
            max_concurrent_requests: usize::MAX,
            ..ProxyConfig::default()
        };
        let server = ProxyServer::new(echo_kernel(), event_loop, config);

        assert_eq!(
            server.state.admission.available_permits(),
            Semaphore::MAX_PERMITS
        );
    }

    /// Reads one `Content-Length` framed response, returning head and body.
    fn read_response(stream: &mut std::net::TcpStream) -> (String, String) {
        let mut seen = Vec::new();
        let mut chunk = [0u8; 256];

        loop {
            let text = String::from_utf8_lossy(&seen).into_owned();
            if let Some((head, body)) = text.split_once("\r\n\r\n") {
                let length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .expect("content-length header");
                if body.len() >= length {
                    return (head.to_string(), body.to_string());
                }
            }

            let n = stream.read(&mut chunk).expect("read response");
            assert!(n > 0, "connection closed mid-response");
            seen.extend_from_slice(&chunk[..n]);
        }
    }

    #[test]
    fn test_drain_closes_idle_keep_alive_connections() {
        use std::net::TcpStream as StdStream;
        use std::time::Instant;

        const READ_TIMEOUT: Duration = Duration::from_secs(5);

        let event_loop = EventLoop::new().expect("loop");
        let config = ProxyConfig::new().with_drain_interval(Duration::from_millis(10));
        let server = ProxyServer::new(echo_kernel(), event_loop, config);
        let addr = server.listen().expect("listen");

        // One idle keep-alive connection and one request stuck mid-body.
        let setup = std::thread::spawn(move || {
            let mut idle = StdStream::connect(addr).expect("connect idle");
            idle.set_read_timeout(Some(READ_TIMEOUT)).expect("timeout");
            idle.write_all(b"GET /ping HTTP/1.1\r\nHost: app.test\r\n\r\n")
                .expect("write idle");
            let (head, body) = read_response(&mut idle);
            assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
            assert_eq!(body, "/ping");

            let mut busy = StdStream::connect(addr).expect("connect busy");
            busy.set_read_timeout(Some(READ_TIMEOUT)).expect("timeout");
            busy.write_all(
                b"POST /slow HTTP/1.1\r\nHost: app.test\r\nContent-Length: 5\r\n\r\nhe",
            )
            .expect("write busy");
            (idle, busy)
        });

        let (mut idle, mut busy) = server
            .event_loop()
            .drive(async {
                let deadline = Instant::now() + READ_TIMEOUT;
                while !(setup.is_finished() && server.in_flight() == 1) {
                    assert!(Instant::now() < deadline, "slow request was not admitted");
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                setup.join().expect("setup thread")
            })
            .expect("drive");

        let client = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let _ = idle.write_all(b"GET /late HTTP/1.1\r\nHost: app.test\r\n\r\n");
            let mut late = Vec::new();
            let _ = idle.read_to_end(&mut late);

            busy.write_all(b"llo").expect("finish body");
            let finished = read_response(&mut busy);
            (late, finished)
        });

        server.flush().expect("flush");
        let (late, (head, body)) = client.join().expect("client thread");

        assert!(late.is_empty(), "{}", String::from_utf8_lossy(&late));
        assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
        assert_eq!(body, "/slow");
        assert_eq!(server.connection_count(), 0);
    }

    #[test]
    fn test_serves_request_while_driven() {
        let server = server();
        let addr = server.listen().expect("listen");

        let client = std::thread::spawn(move || {
            let mut stream = std::net::TcpStream::connect(addr).expect("connect");
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .expect("timeout");
            stream
                .write_all(b"GET /ping HTTP/1.1\r\nHost: app.test\r\nConnection: close\r\n\r\n")
                .expect("write");
            let mut response = String::new();
            stream.read_to_string(&mut response).expect("read");
            response
        });

        let response = server
            .event_loop()
            .drive(async move {
                loop {
                    if client.is_finished() {
                        return client.join().expect("client thread");
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .expect("drive");

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("/ping"));
        assert_eq!(server.in_flight(), 0);
    }
}
