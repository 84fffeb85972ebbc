//! Proxy listener configuration.
//!
//! # Example
//!
//! ```ignore
//! use proxied_webdriver::ProxyConfig;
//!
//! let config = ProxyConfig::new()
//!     .with_port(8089)
//!     .with_public_root("./public")
//!     .with_max_concurrent_requests(50);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Semaphore;

// ============================================================================
// Constants
// ============================================================================

/// Default bind host (loopback).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default concurrent request admission cap.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Default request body cap (32 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Default drain poll interval.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest drain poll interval; a zero period cannot drive a timer.
pub const MIN_DRAIN_INTERVAL: Duration = Duration::from_millis(1);

/// Largest admission cap the semaphore can hold.
pub const MAX_CONCURRENT_REQUESTS: usize = Semaphore::MAX_PERMITS;

// ============================================================================
// ProxyConfig
// ============================================================================

/// Proxy listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to (0 picks a free port).
    pub port: u16,

    /// Maximum requests dispatched at once; further requests queue.
    ///
    /// Read through [`Self::admission_permits`], which clamps it to
    /// `1..=MAX_CONCURRENT_REQUESTS`.
    pub max_concurrent_requests: usize,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Directory served for static assets, if any.
    pub public_root: Option<PathBuf>,

    /// How often a drain checks for outstanding requests.
    ///
    /// Read through [`Self::drain_period`], which never goes below
    /// [`MIN_DRAIN_INTERVAL`].
    pub drain_interval: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ProxyConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            public_root: None,
            drain_interval: DEFAULT_DRAIN_INTERVAL,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ProxyConfig {
    /// Sets the bind host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the bind port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the concurrent request cap, clamped to `1..=MAX_CONCURRENT_REQUESTS`.
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max.clamp(1, MAX_CONCURRENT_REQUESTS);
        self
    }

    /// Sets the request body cap in bytes.
    #[inline]
    #[must_use]
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Sets the static asset directory.
    #[inline]
    #[must_use]
    pub fn with_public_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.public_root = Some(root.into());
        self
    }

    /// Sets the drain poll interval (at least [`MIN_DRAIN_INTERVAL`]).
    #[inline]
    #[must_use]
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval.max(MIN_DRAIN_INTERVAL);
        self
    }
}

// ============================================================================
// Effective Limits
// ============================================================================

impl ProxyConfig {
    /// Returns the admission cap the listener actually uses.
    #[inline]
    #[must_use]
    pub fn admission_permits(&self) -> usize {
        self.max_concurrent_requests.clamp(1, MAX_CONCURRENT_REQUESTS)
    }

    /// Returns the drain poll interval the listener actually uses.
    #[inline]
    #[must_use]
    pub fn drain_period(&self) -> Duration {
        self.drain_interval.max(MIN_DRAIN_INTERVAL)
    }
}

// ============================================================================
// Tests
// ============================================================================
