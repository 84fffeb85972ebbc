//! HTTP client settings shared by both executors.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// TransportSettings
// ============================================================================

/// Timeouts and proxy for command traffic.
///
/// Without an explicit proxy the clients ignore `HTTP_PROXY` and friends,
/// so a developer's shell environment never reroutes localhost traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportSettings {
    /// TCP connect timeout.
    pub connection_timeout: Option<Duration>,

    /// Whole-request timeout.
    pub request_timeout: Option<Duration>,

    /// HTTP proxy as `(host, port)`.
    pub http_proxy: Option<(String, u16)>,
}

impl TransportSettings {
    /// Creates settings without timeouts or proxy.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Sets the request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Routes command traffic through an HTTP proxy.
    #[inline]
    #[must_use]
    pub fn with_http_proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.http_proxy = Some((host.into(), port));
        self
    }

    /// Returns the proxy URL, adding `http://` when the host has no scheme.
    #[must_use]
    pub fn proxy_url(&self) -> Option<String> {
        self.http_proxy.as_ref().map(|(host, port)| {
            if host.contains("://") {
                format!("{host}:{port}")
            } else {
                format!("http://{host}:{port}")
            }
        })
    }

    /// Builds the `reqwest` proxy, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the proxy URL is invalid.
    pub(crate) fn proxy(&self) -> Result<Option<reqwest::Proxy>> {
        self.proxy_url()
            .map(|url| {
                reqwest::Proxy::all(&url)
                    .map_err(|e| Error::config(format!("invalid HTTP proxy {url}: {e}")))
            })
            .transpose()
    }
}

// ============================================================================
// Tests
// ============================================================================
