//! Blocking command executor.
//!
//! Used once per session, for negotiation, before any loop machinery is
//! involved. It owns a private runtime inside `reqwest::blocking`, so it must
//! never be created, used, or dropped from a task running on a loop.

// ============================================================================
// Imports
// ============================================================================

use reqwest::blocking::Client;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::{PreparedRequest, WebDriverCommand, WebDriverResponse, decode_response};

use super::CommandExecutor;
use super::settings::TransportSettings;

// ============================================================================
// SyncCommandExecutor
// ============================================================================

/// Command executor that blocks the calling thread on each request.
#[derive(Debug)]
pub struct SyncCommandExecutor {
    /// Remote end URL without trailing slash.
    base_url: String,

    /// Blocking HTTP client.
    client: Client,
}

impl SyncCommandExecutor {
    /// Creates an executor for the remote end at `base_url`.
    ///
    /// # Errors
    ///
    /// - [`Error::LoopReentered`] when called from a task on a loop
    /// - [`Error::Config`] if the proxy is invalid
    /// - [`Error::Transport`] if the client cannot be built
    pub fn new(base_url: impl Into<String>, settings: &TransportSettings) -> Result<Self> {
        ensure_outside_loop()?;

        let mut builder = Client::builder();

        if let Some(timeout) = settings.connection_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder = match settings.proxy()? {
            Some(proxy) => builder.proxy(proxy),
            None => builder.no_proxy(),
        };

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "Sync command executor created");

        Ok(Self {
            base_url,
            client: builder.build()?,
        })
    }

    /// Returns the remote end URL.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl CommandExecutor for SyncCommandExecutor {
    fn execute(&self, command: &WebDriverCommand) -> Result<WebDriverResponse> {
        ensure_outside_loop()?;

        let prepared = PreparedRequest::from_command(&self.base_url, command)?;
        trace!(method = %prepared.method, url = %prepared.url, "Sending command (blocking)");

        let mut request = self.client.request(prepared.method, &prepared.url);
        for (name, value) in prepared.headers {
            request = request.header(name, value);
        }
        if let Some(body) = prepared.body {
            request = request.body(body);
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.bytes()?;

        debug!(command = %command.name, %status, "Command executed (blocking)");
        decode_response(&body, command.session_id.as_ref())
    }
}

fn ensure_outside_loop() -> Result<()> {
    if Handle::try_current().is_ok() {
        return Err(Error::LoopReentered);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
