//! Negotiated session state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{Capabilities, WebDriverResponse};

// ============================================================================
// Dialect
// ============================================================================

/// Wire dialect spoken by the remote end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// JSON Wire Protocol.
    Legacy,
    /// W3C WebDriver.
    W3c,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::W3c => f.write_str("w3c"),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// A negotiated automation session.
///
/// Created once from the negotiation response and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    capabilities: Capabilities,
    dialect: Dialect,
}

impl Session {
    /// Reads the session from a `newSession` response.
    ///
    /// A `capabilities` object inside the value marks the W3C dialect;
    /// otherwise the whole value is the legacy capability set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotCreated`] if the response has no session id.
    pub fn from_negotiation(response: &WebDriverResponse) -> Result<Self> {
        let (dialect, capabilities) = match response.value.get("capabilities") {
            Some(Value::Object(w3c)) => (Dialect::W3c, Capabilities::from_w3c(w3c)),
            _ => {
                let legacy = match &response.value {
                    Value::Object(map) => Capabilities::from(map.clone()),
                    _ => Capabilities::new(),
                };
                (Dialect::Legacy, legacy)
            }
        };

        let id = response.session_id.clone().ok_or_else(|| {
            Error::session_not_created(format!(
                "negotiation response carried no session id: {}",
                response.value
            ))
        })?;

        Ok(Self {
            id,
            capabilities,
            dialect,
        })
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the capabilities reported by the remote end.
    #[inline]
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Returns the negotiated dialect.
    #[inline]
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns `true` for a W3C session.
    #[inline]
    #[must_use]
    pub fn is_w3c(&self) -> bool {
        self.dialect == Dialect::W3c
    }
}

// ============================================================================
// Tests
// ============================================================================
