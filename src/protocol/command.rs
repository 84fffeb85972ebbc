//! Command vocabulary and HTTP routing table.
//!
//! Each [`CommandName`] maps to one HTTP method and a W3C path template.
//! Placeholders start with `:` and are filled from URL parameters.
//!
//! # Commands
//!
//! | Group | Commands |
//! |-------|----------|
//! | Session | `newSession`, `status`, `quit`, `setTimeouts` |
//! | Navigation | `get`, `getCurrentURL`, `goBack`, `goForward`, `refresh`, `getTitle`, `getPageSource` |
//! | Window | `getCurrentWindowHandle`, `screenshot` |
//! | Element | find, click, clear, keys, text, attribute, tag name |
//! | Script | `executeScript`, `executeAsyncScript` |
//! | Cookies | `getAllCookies`, `addCookie`, `deleteAllCookies` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// Prefix marking a parameter as a URL substitution.
pub const URL_PARAM_PREFIX: char = ':';

// ============================================================================
// CommandName
// ============================================================================

/// Automation commands understood by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandName {
    /// Negotiate a new session.
    #[serde(rename = "newSession")]
    NewSession,
    /// Remote end readiness.
    #[serde(rename = "status")]
    Status,
    /// End the session.
    #[serde(rename = "quit")]
    Quit,
    /// Navigate to a URL.
    #[serde(rename = "get")]
    Get,
    /// Current top-level URL.
    #[serde(rename = "getCurrentURL")]
    GetCurrentUrl,
    /// History back.
    #[serde(rename = "goBack")]
    GoBack,
    /// History forward.
    #[serde(rename = "goForward")]
    GoForward,
    /// Reload the page.
    #[serde(rename = "refresh")]
    Refresh,
    /// Document title.
    #[serde(rename = "getTitle")]
    GetTitle,
    /// Serialized DOM.
    #[serde(rename = "getPageSource")]
    GetPageSource,
    /// Current window handle.
    #[serde(rename = "getCurrentWindowHandle")]
    GetWindowHandle,
    /// Script, page load and implicit wait timeouts.
    #[serde(rename = "setTimeouts")]
    SetTimeouts,
    /// Find one element from the document root.
    #[serde(rename = "findElement")]
    FindElement,
    /// Find all matching elements from the document root.
    #[serde(rename = "findElements")]
    FindElements,
    /// Find one element below `:id`.
    #[serde(rename = "findChildElement")]
    FindChildElement,
    /// Find all matching elements below `:id`.
    #[serde(rename = "findChildElements")]
    FindChildElements,
    /// Click `:id`.
    #[serde(rename = "clickElement")]
    ClickElement,
    /// Clear `:id`.
    #[serde(rename = "clearElement")]
    ClearElement,
    /// Type into `:id`.
    #[serde(rename = "sendKeysToElement")]
    SendKeysToElement,
    /// Visible text of `:id`.
    #[serde(rename = "getElementText")]
    GetElementText,
    /// Attribute `:name` of `:id`.
    #[serde(rename = "getElementAttribute")]
    GetElementAttribute,
    /// Tag name of `:id`.
    #[serde(rename = "getElementTagName")]
    GetElementTagName,
    /// Run a synchronous script.
    #[serde(rename = "executeScript")]
    ExecuteScript,
    /// Run an asynchronous script.
    #[serde(rename = "executeAsyncScript")]
    ExecuteAsyncScript,
    /// All cookies visible to the page.
    #[serde(rename = "getAllCookies")]
    GetAllCookies,
    /// Add a cookie.
    #[serde(rename = "addCookie")]
    AddCookie,
    /// Delete every cookie.
    #[serde(rename = "deleteAllCookies")]
    DeleteAllCookies,
    /// Viewport screenshot as base64 PNG.
    #[serde(rename = "screenshot")]
    TakeScreenshot,
}

impl CommandName {
    /// Returns the HTTP method and W3C path template for this command.
    #[must_use]
    pub fn endpoint(self) -> (Method, &'static str) {
        match self {
            Self::NewSession => (Method::POST, "/session"),
            Self::Status => (Method::GET, "/status"),
            Self::Quit => (Method::DELETE, "/session/:sessionId"),
            Self::Get => (Method::POST, "/session/:sessionId/url"),
            Self::GetCurrentUrl => (Method::GET, "/session/:sessionId/url"),
            Self::GoBack => (Method::POST, "/session/:sessionId/back"),
            Self::GoForward => (Method::POST, "/session/:sessionId/forward"),
            Self::Refresh => (Method::POST, "/session/:sessionId/refresh"),
            Self::GetTitle => (Method::GET, "/session/:sessionId/title"),
            Self::GetPageSource => (Method::GET, "/session/:sessionId/source"),
            Self::GetWindowHandle => (Method::GET, "/session/:sessionId/window"),
            Self::SetTimeouts => (Method::POST, "/session/:sessionId/timeouts"),
            Self::FindElement => (Method::POST, "/session/:sessionId/element"),
            Self::FindElements => (Method::POST, "/session/:sessionId/elements"),
            Self::FindChildElement => (Method::POST, "/session/:sessionId/element/:id/element"),
            Self::FindChildElements => (Method::POST, "/session/:sessionId/element/:id/elements"),
            Self::ClickElement => (Method::POST, "/session/:sessionId/element/:id/click"),
            Self::ClearElement => (Method::POST, "/session/:sessionId/element/:id/clear"),
            Self::SendKeysToElement => (Method::POST, "/session/:sessionId/element/:id/value"),
            Self::GetElementText => (Method::GET, "/session/:sessionId/element/:id/text"),
            Self::GetElementAttribute => (
                Method::GET,
                "/session/:sessionId/element/:id/attribute/:name",
            ),
            Self::GetElementTagName => (Method::GET, "/session/:sessionId/element/:id/name"),
            Self::ExecuteScript => (Method::POST, "/session/:sessionId/execute/sync"),
            Self::ExecuteAsyncScript => (Method::POST, "/session/:sessionId/execute/async"),
            Self::GetAllCookies => (Method::GET, "/session/:sessionId/cookie"),
            Self::AddCookie => (Method::POST, "/session/:sessionId/cookie"),
            Self::DeleteAllCookies => (Method::DELETE, "/session/:sessionId/cookie"),
            Self::TakeScreenshot => (Method::GET, "/session/:sessionId/screenshot"),
        }
    }

    /// Returns the wire name of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewSession => "newSession",
            Self::Status => "status",
            Self::Quit => "quit",
            Self::Get => "get",
            Self::GetCurrentUrl => "getCurrentURL",
            Self::GoBack => "goBack",
            Self::GoForward => "goForward",
            Self::Refresh => "refresh",
            Self::GetTitle => "getTitle",
            Self::GetPageSource => "getPageSource",
            Self::GetWindowHandle => "getCurrentWindowHandle",
            Self::SetTimeouts => "setTimeouts",
            Self::FindElement => "findElement",
            Self::FindElements => "findElements",
            Self::FindChildElement => "findChildElement",
            Self::FindChildElements => "findChildElements",
            Self::ClickElement => "clickElement",
            Self::ClearElement => "clearElement",
            Self::SendKeysToElement => "sendKeysToElement",
            Self::GetElementText => "getElementText",
            Self::GetElementAttribute => "getElementAttribute",
            Self::GetElementTagName => "getElementTagName",
            Self::ExecuteScript => "executeScript",
            Self::ExecuteAsyncScript => "executeAsyncScript",
            Self::GetAllCookies => "getAllCookies",
            Self::AddCookie => "addCookie",
            Self::DeleteAllCookies => "deleteAllCookies",
            Self::TakeScreenshot => "screenshot",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// WebDriverCommand
// ============================================================================

/// One automation command, built per call and consumed by the executor.
///
/// Parameters whose key starts with `:` are URL substitutions; every other
/// parameter is a JSON body field.
///
/// # Example
///
/// ```ignore
/// let command = WebDriverCommand::new(Some(session_id), CommandName::GetElementAttribute)
///     .with_url_param("id", element.as_str())
///     .with_url_param("name", "href");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WebDriverCommand {
    /// Session the command targets (`None` for `newSession` and `status`).
    pub session_id: Option<SessionId>,

    /// Command name.
    pub name: CommandName,

    /// Body fields and `:`-prefixed URL parameters.
    pub parameters: Map<String, Value>,
}

impl WebDriverCommand {
    /// Creates a command without parameters.
    #[inline]
    #[must_use]
    pub fn new(session_id: Option<SessionId>, name: CommandName) -> Self {
        Self {
            session_id,
            name,
            parameters: Map::new(),
        }
    }

    /// Creates a `newSession` command from a negotiation payload.
    ///
    /// Top-level keys of an object payload become body fields.
    #[must_use]
    pub fn new_session(payload: Value) -> Self {
        let parameters = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            session_id: None,
            name: CommandName::NewSession,
            parameters,
        }
    }

    /// Adds a JSON body field.
    #[inline]
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Adds a URL substitution for the `:key` placeholder.
    #[inline]
    #[must_use]
    pub fn with_url_param(mut self, key: &str, value: impl Into<String>) -> Self {
        let key = key.trim_start_matches(URL_PARAM_PREFIX);
        self.parameters
            .insert(format!("{URL_PARAM_PREFIX}{key}"), Value::String(value.into()));
        self
    }

    /// Returns `true` if the key names a URL substitution.
    #[inline]
    #[must_use]
    pub fn is_url_param(key: &str) -> bool {
        key.starts_with(URL_PARAM_PREFIX)
    }
}

// ============================================================================
// Tests
// ============================================================================
