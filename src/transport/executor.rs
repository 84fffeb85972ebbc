//! Non-blocking command executor.
//!
//! Sends each command with the async `reqwest` client and drives the shared
//! [`EventLoop`] until that one response has arrived. While the caller waits,
//! every other task on the loop keeps running, including the proxy serving
//! the pages the browser requests as a result of the command.
//!
//! # Flow
//!
//! ```text
//! execute(cmd)
//!   └─ drive(loop) ─┬─ send(cmd) ───────► remote end
//!                   ├─ proxy requests     (served meanwhile)
//!                   └─ response ◄─────── remote end
//!   └─ decode
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, trace};

use crate::error::Result;
use crate::event_loop::EventLoop;
use crate::protocol::{PreparedRequest, WebDriverCommand, WebDriverResponse, decode_response};

use super::CommandExecutor;
use super::settings::TransportSettings;

// ============================================================================
// AsyncCommandExecutor
// ============================================================================

/// Command executor that waits by driving the event loop.
#[derive(Debug, Clone)]
pub struct AsyncCommandExecutor {
    /// Remote end URL without trailing slash.
    base_url: String,

    /// Non-blocking HTTP client.
    client: Client,

    /// Loop shared with the proxy.
    event_loop: EventLoop,
}

impl AsyncCommandExecutor {
    /// Creates an executor for the remote end at `base_url`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the proxy is invalid
    /// - [`Error::Transport`](crate::Error::Transport) if the client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        settings: &TransportSettings,
        event_loop: EventLoop,
    ) -> Result<Self> {
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
        debug!(base_url = %base_url, "Async command executor created");

        Ok(Self {
            base_url,
            client: builder.build()?,
            event_loop,
        })
    }

    /// Returns the remote end URL.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the loop this executor drives.
    #[inline]
    #[must_use]
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Sends a command without driving the loop.
    ///
    /// For callers already running on the loop.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCommand`](crate::Error::InvalidCommand) if the command cannot be prepared
    /// - [`Error::Transport`](crate::Error::Transport) if the exchange fails
    /// - decoding errors from [`decode_response`]
    pub async fn send(&self, command: &WebDriverCommand) -> Result<WebDriverResponse> {
        let prepared = PreparedRequest::from_command(&self.base_url, command)?;
        let body = self.exchange(prepared).await?;
        decode_response(&body, command.session_id.as_ref())
    }

    async fn exchange(&self, prepared: PreparedRequest) -> Result<Bytes> {
        trace!(method = %prepared.method, url = %prepared.url, "Sending command");

        let mut request = self.client.request(prepared.method, &prepared.url);
        for (name, value) in prepared.headers {
            request = request.header(name, value);
        }
        if let Some(body) = prepared.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        trace!(%status, len = body.len(), "Command response received");
        Ok(body)
    }
}

impl CommandExecutor for AsyncCommandExecutor {
    /// Sends the command and drives the loop until its response settles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopReentered`](crate::Error::LoopReentered) when
    /// called from a task on the loop; otherwise as [`send`](Self::send).
    fn execute(&self, command: &WebDriverCommand) -> Result<WebDriverResponse> {
        let started = Instant::now();
        let response = self.event_loop.drive(self.send(command))??;

        debug!(
            command = %command.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command executed"
        );

        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================
