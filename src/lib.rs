//! Proxied WebDriver - Browser tests against an in-process application.
//!
//! This library lets a synchronous application serve a remotely driven
//! browser while the test thread issues ordinary blocking WebDriver commands
//! against that same browser.
//!
//! # Architecture
//!
//! One cooperative [`EventLoop`] is shared by two components:
//!
//! - **Proxy**: [`ProxyServer`] accepts the browser's HTTP requests, serves
//!   static assets, and hands everything else to a synchronous [`Kernel`]
//! - **Bridge**: [`AsyncWebDriver`] sends each command over a non-blocking
//!   client and drives the loop until that response arrives
//!
//! Because waiting for a command drives the loop, the page loads a command
//! triggers are served while the caller is blocked on it.
//!
//! Links generated by the application are routed back through the proxy by
//! [`ProxiedUrlGenerator`], which records the original origin in a query
//! token that the proxy strips again on the way in.
//!
//! # Quick Start
//!
//! ```no_run
//! use proxied_webdriver::{
//!     AppRequest, AppResponse, AsyncWebDriver, EventLoop, KernelError, ProxyConfig,
//!     ProxyServer, Result,
//! };
//!
//! fn main() -> Result<()> {
//!     let event_loop = EventLoop::new()?;
//!
//!     let kernel = |req: &AppRequest| -> std::result::Result<AppResponse, KernelError> {
//!         Ok(AppResponse::ok(format!("<title>{}</title>", req.path())))
//!     };
//!
//!     let server = ProxyServer::new(kernel, event_loop.clone(), ProxyConfig::default());
//!     server.listen()?;
//!
//!     let driver = AsyncWebDriver::builder()
//!         .server_url("http://localhost:9515")
//!         .connect(&event_loop)?;
//!
//!     driver.get(&format!("{}home", server.url()?))?;
//!     assert_eq!(driver.title()?, "/home");
//!
//!     driver.quit()?;
//!     server.flush()?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`driver`] | Session bootstrap and [`AsyncWebDriver`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`event_loop`] | Shared cooperative [`EventLoop`] |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Command routing and response decoding |
//! | [`rewrite`] | URL rewriting through the proxy |
//! | [`server`] | Embedded HTTP proxy |
//! | [`transport`] | Blocking and loop-driving executors |

// ============================================================================
// Modules
// ============================================================================

/// Session bootstrap and driver handle.
///
/// Use [`AsyncWebDriver::builder()`] to negotiate a session.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Cooperative event loop shared by the proxy and the bridge.
pub mod event_loop;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Automation command protocol.
///
/// Routing table, request preparation and response decoding. No IO.
pub mod protocol;

/// URL rewriting through the proxy.
pub mod rewrite;

/// Embedded HTTP proxy.
pub mod server;

/// Command transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Driver types
pub use driver::{AsyncWebDriver, By, Dialect, DriverBuilder, Session};

// Error types
pub use error::{Error, Result};

// Event loop
pub use event_loop::EventLoop;

// Identifier types
pub use identifiers::{ConnectionId, ElementId, SessionId};

// Protocol types
pub use protocol::{Capabilities, CommandName, WebDriverCommand, WebDriverResponse};

// Rewrite types
pub use rewrite::{ProxiedUrlGenerator, UrlGenerator};

// Server types
pub use server::{AppRequest, AppResponse, Kernel, KernelError, ProxyConfig, ProxyServer};

// Transport types
pub use transport::{
    AsyncCommandExecutor, CommandExecutor, SyncCommandExecutor, TransportSettings,
};
