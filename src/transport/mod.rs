//! Command transport.
//!
//! Two executors speak the same protocol over different clients:
//!
//! | Executor | Client | Waits by | Used for |
//! |----------|--------|----------|----------|
//! | [`SyncCommandExecutor`] | `reqwest::blocking` | blocking the thread | session negotiation |
//! | [`AsyncCommandExecutor`] | `reqwest` | driving the [`EventLoop`](crate::EventLoop) | every later command |
//!
//! Both look like ordinary blocking calls through [`CommandExecutor`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `executor` | Loop-driving executor |
//! | `settings` | Timeouts and proxy |
//! | `sync` | Blocking executor |

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::protocol::{WebDriverCommand, WebDriverResponse};

// ============================================================================
// Submodules
// ============================================================================

/// Loop-driving executor.
pub mod executor;

/// Client settings.
pub mod settings;

/// Blocking executor.
pub mod sync;

// ============================================================================
// Re-exports
// ============================================================================

pub use executor::AsyncCommandExecutor;
pub use settings::TransportSettings;
pub use sync::SyncCommandExecutor;

// ============================================================================
// CommandExecutor
// ============================================================================

/// Executes one command and returns its decoded response.
///
/// Implementations block the caller until the response has settled.
pub trait CommandExecutor {
    /// Sends `command` and waits for the answer.
    ///
    /// # Errors
    ///
    /// Transport, protocol and decoding failures for this one command.
    fn execute(&self, command: &WebDriverCommand) -> Result<WebDriverResponse>;
}
