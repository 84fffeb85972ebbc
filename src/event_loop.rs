//! Explicit cooperative event loop shared by the proxy and the command bridge.
//!
//! The loop is a single-threaded tokio runtime. Tasks spawned on it only make
//! progress while some caller drives the loop with [`EventLoop::drive`], so a
//! blocking command call that waits for its own response also serves every
//! pending proxy request in the meantime.
//!
//! # Example
//!
//! ```ignore
//! let event_loop = EventLoop::new()?;
//! let proxy = ProxyServer::new(kernel, event_loop.clone(), ProxyConfig::default());
//! proxy.listen()?;
//!
//! // Blocks until the response arrives; proxy traffic is served meanwhile.
//! let body = event_loop.drive(async { fetch().await })?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, EnterGuard, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// EventLoop
// ============================================================================

/// Handle to a single-threaded cooperative event loop.
///
/// Cloning is cheap; all clones drive the same loop.
#[derive(Clone)]
pub struct EventLoop {
    /// The underlying current-thread runtime.
    runtime: Arc<Runtime>,
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("alive_tasks", &self.runtime.metrics().num_alive_tasks())
            .finish()
    }
}

impl EventLoop {
    /// Creates a new loop with IO and timers enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the runtime cannot be created.
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    /// Drives the loop on the calling thread until `future` completes.
    ///
    /// Every other task on the loop is serviced while waiting; only the
    /// completion of `future` itself returns control to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopReentered`] when called from a task running on
    /// a loop, where blocking would stall the loop that has to wake it.
    pub fn drive<F: Future>(&self, future: F) -> Result<F::Output> {
        if Handle::try_current().is_ok() {
            return Err(Error::LoopReentered);
        }

        trace!("Driving event loop");
        Ok(self.runtime.block_on(future))
    }

    /// Schedules a task on the loop.
    ///
    /// The task runs whenever the loop is driven.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Enters the loop context so sockets can register with its reactor.
    #[must_use]
    pub fn enter(&self) -> EnterGuard<'_> {
        self.runtime.enter()
    }

    /// Returns `true` if both handles drive the same loop.
    #[inline]
    #[must_use]
    pub fn same_loop(&self, other: &EventLoop) -> bool {
        Arc::ptr_eq(&self.runtime, &other.runtime)
    }
}

// ============================================================================
// Tests
// ============================================================================
