//! Session bootstrap and driver handle.
//!
//! Negotiation happens once, with a blocking request, before any loop
//! machinery is involved. The driver it produces sends every later command
//! through the loop-driving executor.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DriverBuilder`] | Endpoint, capabilities, timeouts, proxy |
//! | [`Session`] | Id, capabilities and dialect from negotiation |
//! | [`AsyncWebDriver`] | Blocking command helpers for one session |
//! | [`By`] | Element locators |
//!
//! # Example
//!
//! ```no_run
//! use proxied_webdriver::{AsyncWebDriver, EventLoop, Result};
//!
//! # fn example() -> Result<()> {
//! let event_loop = EventLoop::new()?;
//! let driver = AsyncWebDriver::builder()
//!     .server_url("http://localhost:9515")
//!     .connect(&event_loop)?;
//!
//! driver.get("http://127.0.0.1:8089/")?;
//! println!("{}", driver.title()?);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder and session negotiation.
pub mod builder;

/// Driver handle.
pub mod core;

/// Element locator strategies.
pub mod locator;

/// Negotiated session state.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::DriverBuilder;
pub use self::core::AsyncWebDriver;
pub use locator::By;
pub use session::{Dialect, Session};
