//! Builder pattern for driver configuration.
//!
//! Provides a fluent API for negotiating a session and creating an
//! [`AsyncWebDriver`].
//!
//! # Example
//!
//! ```no_run
//! use proxied_webdriver::{AsyncWebDriver, Capabilities, EventLoop};
//!
//! # fn example() -> proxied_webdriver::Result<()> {
//! let event_loop = EventLoop::new()?;
//! let driver = AsyncWebDriver::builder()
//!     .server_url("http://localhost:9515")
//!     .desired_capabilities(Capabilities::new().with("browserName", "chrome"))
//!     .connect(&event_loop)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::{Map, Value, json};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::event_loop::EventLoop;
use crate::protocol::{Capabilities, WebDriverCommand};
use crate::transport::{
    AsyncCommandExecutor, CommandExecutor, SyncCommandExecutor, TransportSettings,
};

use super::core::AsyncWebDriver;
use super::session::Session;

// ============================================================================
// Constants
// ============================================================================

/// Default remote end (a local chromedriver).
pub const DEFAULT_SERVER_URL: &str = "http://localhost:9515";

// ============================================================================
// DriverBuilder
// ============================================================================

/// Builder for negotiating a session.
///
/// Use [`AsyncWebDriver::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct DriverBuilder {
    /// Remote end URL without trailing slash.
    server_url: String,
    /// Capabilities offered as the first match.
    desired: Capabilities,
    /// Capabilities the session must have.
    required: Option<Capabilities>,
    /// Timeouts and proxy.
    settings: TransportSettings,
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// DriverBuilder Implementation
// ============================================================================

impl DriverBuilder {
    /// Creates a builder targeting [`DEFAULT_SERVER_URL`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            desired: Capabilities::new(),
            required: None,
            settings: TransportSettings::new(),
        }
    }

    /// Sets the remote end URL. Trailing slashes are dropped.
    #[inline]
    #[must_use]
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the desired capabilities.
    #[inline]
    #[must_use]
    pub fn desired_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.desired = capabilities;
        self
    }

    /// Sets the required capabilities.
    #[inline]
    #[must_use]
    pub fn required_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.required = Some(capabilities);
        self
    }

    /// Sets the connect timeout for session negotiation.
    #[inline]
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.settings = self.settings.with_connection_timeout(timeout);
        self
    }

    /// Sets the request timeout for session negotiation.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.settings = self.settings.with_request_timeout(timeout);
        self
    }

    /// Routes negotiation and command traffic through an HTTP proxy.
    #[inline]
    #[must_use]
    pub fn http_proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.settings = self.settings.with_http_proxy(host, port);
        self
    }

    /// Returns the configured remote end URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.server_url
    }

    /// Builds the `newSession` payload.
    ///
    /// Both dialects are sent at once:
    ///
    /// ```json
    /// {
    ///   "capabilities": {"firstMatch": [<w3c desired>], "alwaysMatch": <w3c required>},
    ///   "desiredCapabilities": <legacy desired + requiredCapabilities>
    /// }
    /// ```
    #[must_use]
    pub fn negotiation_payload(&self) -> Value {
        let mut capabilities = Map::new();
        capabilities.insert(
            "firstMatch".to_string(),
            Value::Array(vec![Value::Object(self.desired.to_w3c())]),
        );

        let mut legacy = self.desired.as_map().clone();

        if let Some(required) = self.required.as_ref().filter(|r| !r.is_empty()) {
            capabilities.insert("alwaysMatch".to_string(), Value::Object(required.to_w3c()));
            legacy.insert("requiredCapabilities".to_string(), required.to_value());
        }

        json!({
            "capabilities": capabilities,
            "desiredCapabilities": legacy,
        })
    }

    /// Negotiates a session and returns a driver bound to `event_loop`.
    ///
    /// Negotiation is a single blocking request with the configured
    /// timeouts. Every later command goes through the loop without them.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the server URL is invalid
    /// - [`Error::LoopReentered`] when called from a task on the loop
    /// - [`Error::SessionNotCreated`] if negotiation fails for any other reason
    pub fn connect(self, event_loop: &EventLoop) -> Result<AsyncWebDriver> {
        self.validate_server_url()?;

        let session = self.negotiate()?;

        info!(
            session_id = %session.id(),
            dialect = %session.dialect(),
            server_url = %self.server_url,
            "Session established"
        );

        // Timeouts bound negotiation only.
        let command_settings = TransportSettings {
            connection_timeout: None,
            request_timeout: None,
            ..self.settings.clone()
        };
        let executor =
            AsyncCommandExecutor::new(&self.server_url, &command_settings, event_loop.clone())?;

        Ok(AsyncWebDriver::new(executor, session))
    }
}

// ============================================================================
// Negotiation
// ============================================================================

impl DriverBuilder {
    fn negotiate(&self) -> Result<Session> {
        let executor = SyncCommandExecutor::new(&self.server_url, &self.settings)
            .map_err(not_created)?;

        let payload = self.negotiation_payload();
        debug!(payload = %payload, "Negotiating session");

        let response = executor
            .execute(&WebDriverCommand::new_session(payload))
            .map_err(not_created)?;

        Session::from_negotiation(&response)
    }

    fn validate_server_url(&self) -> Result<()> {
        let url = Url::parse(&self.server_url).map_err(|e| {
            Error::config(format!("invalid server URL {:?}: {e}", self.server_url))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "server URL must be http or https, got {}",
                url.scheme()
            )));
        }

        Ok(())
    }
}

/// Maps a negotiation failure to [`Error::SessionNotCreated`].
///
/// Loop misuse is a caller error and passes through unchanged.
fn not_created(err: Error) -> Error {
    match err {
        Error::LoopReentered | Error::SessionNotCreated { .. } => err,
        other => Error::session_not_created(other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
