//! Driver handle for one negotiated session.
//!
//! Every method is a blocking call: the command goes out over the
//! non-blocking client and the shared loop is driven until the answer
//! arrives, serving proxy traffic in the meantime.
//!
//! # Example
//!
//! ```no_run
//! use proxied_webdriver::{AsyncWebDriver, By, EventLoop};
//!
//! # fn example() -> proxied_webdriver::Result<()> {
//! let event_loop = EventLoop::new()?;
//! let driver = AsyncWebDriver::builder().connect(&event_loop)?;
//!
//! driver.get("http://127.0.0.1:8089/login")?;
//! let button = driver.find_element(&By::css("button[type=submit]"))?;
//! driver.click(&button)?;
//!
//! driver.quit()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::{ElementId, SessionId};
use crate::protocol::{Capabilities, CommandName, WebDriverCommand};
use crate::transport::{AsyncCommandExecutor, CommandExecutor};

use super::builder::DriverBuilder;
use super::locator::By;
use super::session::{Dialect, Session};

// ============================================================================
// Constants
// ============================================================================

/// W3C web element reference key.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a5e4f4d52ac";

/// JSON Wire Protocol element reference key.
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

// ============================================================================
// AsyncWebDriver
// ============================================================================

/// Driver bound to one session and one event loop.
///
/// The session belongs to this driver alone. [`quit`](Self::quit) ends it.
pub struct AsyncWebDriver {
    /// Loop-driving executor.
    executor: AsyncCommandExecutor,

    /// Negotiated session.
    session: Session,
}

impl fmt::Debug for AsyncWebDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncWebDriver")
            .field("session_id", self.session.id())
            .field("dialect", &self.session.dialect())
            .field("server_url", &self.executor.base_url())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// AsyncWebDriver - Construction
// ============================================================================

impl AsyncWebDriver {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Wires an executor to an already negotiated session.
    #[must_use]
    pub fn new(executor: AsyncCommandExecutor, session: Session) -> Self {
        Self { executor, session }
    }

    /// Returns the session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.session.id()
    }

    /// Returns the negotiated capabilities.
    #[inline]
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        self.session.capabilities()
    }

    /// Returns the negotiated dialect.
    #[inline]
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.session.dialect()
    }

    /// Returns the executor.
    #[inline]
    #[must_use]
    pub fn executor(&self) -> &AsyncCommandExecutor {
        &self.executor
    }
}

// ============================================================================
// AsyncWebDriver - Commands
// ============================================================================

impl AsyncWebDriver {
    /// Executes a command in this session and returns its value.
    ///
    /// `parameters` uses the same convention as [`WebDriverCommand`]: keys
    /// starting with `:` fill the path, the rest form the body.
    ///
    /// # Errors
    ///
    /// Any transport, protocol or remote error for this command.
    pub fn execute(&self, name: CommandName, parameters: Map<String, Value>) -> Result<Value> {
        self.run(WebDriverCommand {
            session_id: Some(self.session.id().clone()),
            name,
            parameters,
        })
    }

    fn command(&self, name: CommandName) -> WebDriverCommand {
        WebDriverCommand::new(Some(self.session.id().clone()), name)
    }

    fn run(&self, command: WebDriverCommand) -> Result<Value> {
        Ok(self.executor.execute(&command)?.into_value())
    }

    fn element_command(&self, name: CommandName, element: &ElementId) -> WebDriverCommand {
        self.command(name).with_url_param("id", element.as_str())
    }
}

// ============================================================================
// AsyncWebDriver - Navigation
// ============================================================================

impl AsyncWebDriver {
    /// Navigates to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn get(&self, url: &str) -> Result<()> {
        debug!(url, "Navigating");
        self.run(self.command(CommandName::Get).with_param("url", url))?;
        Ok(())
    }

    /// Returns the current top-level URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the value is not a string.
    pub fn current_url(&self) -> Result<String> {
        expect_string(
            CommandName::GetCurrentUrl,
            self.run(self.command(CommandName::GetCurrentUrl))?,
        )
    }

    /// Returns the document title.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the value is not a string.
    pub fn title(&self) -> Result<String> {
        expect_string(CommandName::GetTitle, self.run(self.command(CommandName::GetTitle))?)
    }

    /// Returns the serialized DOM.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the value is not a string.
    pub fn page_source(&self) -> Result<String> {
        expect_string(
            CommandName::GetPageSource,
            self.run(self.command(CommandName::GetPageSource))?,
        )
    }

    /// Goes back in history.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn back(&self) -> Result<()> {
        self.run(self.command(CommandName::GoBack)).map(drop)
    }

    /// Goes forward in history.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn forward(&self) -> Result<()> {
        self.run(self.command(CommandName::GoForward)).map(drop)
    }

    /// Reloads the page.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn refresh(&self) -> Result<()> {
        self.run(self.command(CommandName::Refresh)).map(drop)
    }
}

// ============================================================================
// AsyncWebDriver - Elements
// ============================================================================

impl AsyncWebDriver {
    /// Finds the first element matching `by`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebDriver`] with code `no such element` if nothing
    /// matches.
    pub fn find_element(&self, by: &By) -> Result<ElementId> {
        let (using, value) = by.to_w3c();
        let found = self.run(
            self.command(CommandName::FindElement)
                .with_param("using", using)
                .with_param("value", value),
        )?;
        element_id(&found)
    }

    /// Finds every element matching `by`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or a reference is malformed.
    pub fn find_elements(&self, by: &By) -> Result<Vec<ElementId>> {
        let (using, value) = by.to_w3c();
        let found = self.run(
            self.command(CommandName::FindElements)
                .with_param("using", using)
                .with_param("value", value),
        )?;

        match found {
            Value::Array(items) => items.iter().map(element_id).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(unexpected_value(CommandName::FindElements, &other)),
        }
    }

    /// Clicks an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn click(&self, element: &ElementId) -> Result<()> {
        self.run(self.element_command(CommandName::ClickElement, element))
            .map(drop)
    }

    /// Clears an editable element.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn clear(&self, element: &ElementId) -> Result<()> {
        self.run(self.element_command(CommandName::ClearElement, element))
            .map(drop)
    }

    /// Types `text` into an element.
    ///
    /// Sends both the W3C `text` field and the legacy `value` character list.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn send_keys(&self, element: &ElementId, text: &str) -> Result<()> {
        let chars: Vec<Value> = text.chars().map(|c| Value::String(c.to_string())).collect();

        self.run(
            self.element_command(CommandName::SendKeysToElement, element)
                .with_param("text", text)
                .with_param("value", chars),
        )
        .map(drop)
    }

    /// Returns the visible text of an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the value is not a string.
    pub fn text(&self, element: &ElementId) -> Result<String> {
        expect_string(
            CommandName::GetElementText,
            self.run(self.element_command(CommandName::GetElementText, element))?,
        )
    }

    /// Returns an attribute of an element, or `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn attribute(&self, element: &ElementId, name: &str) -> Result<Option<String>> {
        let value = self.run(
            self.element_command(CommandName::GetElementAttribute, element)
                .with_url_param("name", name),
        )?;

        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }
}

// ============================================================================
// AsyncWebDriver - Scripts & Lifecycle
// ============================================================================

impl AsyncWebDriver {
    /// Runs a synchronous script in the page and returns its result.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the script throws.
    pub fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.run(
            self.command(CommandName::ExecuteScript)
                .with_param("script", script)
                .with_param("args", args),
        )
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote end rejects the request.
    pub fn quit(self) -> Result<()> {
        let session_id = self.session.id().clone();
        self.run(self.command(CommandName::Quit))?;
        info!(session_id = %session_id, "Session ended");
        Ok(())
    }
}

// ============================================================================
// Value Helpers
// ============================================================================

/// Reads an element reference from either dialect's key.
fn element_id(value: &Value) -> Result<ElementId> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(ElementId::new)
        .ok_or_else(|| Error::MalformedResponse {
            message: "value is not an element reference".to_string(),
            body: value.to_string(),
        })
}

fn expect_string(name: CommandName, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(unexpected_value(name, &other)),
    }
}

fn unexpected_value(name: CommandName, value: &Value) -> Error {
    Error::MalformedResponse {
        message: format!("unexpected value for {name}"),
        body: json!({ "value": value }).to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
