//! Error types for the proxy harness.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use proxied_webdriver::{Error, Result};
//!
//! fn example(driver: &AsyncWebDriver) -> Result<()> {
//!     driver.get("http://app.test/login")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::ServerClosed`], [`Error::LoopReentered`] |
//! | Transport | [`Error::Transport`], [`Error::Http`], [`Error::Io`] |
//! | Protocol | [`Error::InvalidCommand`], [`Error::MalformedResponse`], [`Error::WebDriver`] |
//! | Session | [`Error::SessionNotCreated`] |
//! | Rewriting | [`Error::InvalidToken`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when listener or driver configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The proxy listener was already drained.
    ///
    /// A listener drains once per lifetime; it cannot listen again afterwards.
    #[error("Proxy server already drained")]
    ServerClosed,

    /// The event loop was driven from inside itself.
    ///
    /// Returned when a blocking call is made from a task running on the loop.
    #[error("Event loop cannot be driven from within one of its own tasks")]
    LoopReentered,

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Outbound HTTP exchange failed.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Inbound HTTP connection failed.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The command cannot be turned into a request.
    ///
    /// Returned when body fields are paired with a method other than POST,
    /// or a path placeholder has no value.
    #[error("Invalid command {command}: {message}")]
    InvalidCommand {
        /// Command name.
        command: String,
        /// What is wrong with it.
        message: String,
    },

    /// Response body was not valid JSON.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Decoder message.
        message: String,
        /// Raw body, lossily decoded.
        body: String,
    },

    /// The remote end reported an error.
    #[error("WebDriver error {error}: {message}")]
    WebDriver {
        /// Error code (W3C string or legacy numeric status).
        error: String,
        /// Error message.
        message: String,
        /// Full decoded response.
        payload: Value,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Session negotiation failed.
    ///
    /// The command bridge is never constructed when this is returned.
    #[error("Session could not be established: {message}")]
    SessionNotCreated {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Rewriting Errors
    // ========================================================================
    /// A rewrite token could not be decoded.
    #[error("Invalid rewrite token: {message}")]
    InvalidToken {
        /// Description of the decoding failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid command error.
    #[inline]
    pub fn invalid_command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCommand {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed response error.
    #[inline]
    pub fn malformed_response(err: &serde_json::Error, body: &[u8]) -> Self {
        Self::MalformedResponse {
            message: err.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Creates a remote WebDriver error.
    #[inline]
    pub fn webdriver(error: impl Into<String>, message: impl Into<String>, payload: Value) -> Self {
        Self::WebDriver {
            error: error.into(),
            message: message.into(),
            payload,
        }
    }

    /// Creates a session negotiation error.
    #[inline]
    pub fn session_not_created(message: impl Into<String>) -> Self {
        Self::SessionNotCreated {
            message: message.into(),
        }
    }

    /// Creates an invalid rewrite token error.
    #[inline]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the failure was reported by, or concerns, the command protocol.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCommand { .. } | Self::MalformedResponse { .. } | Self::WebDriver { .. }
        )
    }

    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http(_) | Self::Io(_))
    }

    /// Returns the remote error code, if the remote end reported one.
    #[inline]
    #[must_use]
    pub fn webdriver_code(&self) -> Option<&str> {
        match self {
            Self::WebDriver { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
