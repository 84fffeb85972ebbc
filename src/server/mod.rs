//! Embedded HTTP proxy in front of a synchronous application kernel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   HTTP/1.1   ┌───────────────────────────────────────┐
//! │ Browser  │─────────────►│ ProxyServer (one EventLoop)           │
//! └──────────┘              │  accept ─► admission ─► static file?  │
//!                           │                │            │ no      │
//!                           │                │ yes        ▼         │
//!                           │                ▼      un-rewrite URI  │
//!                           │          stream disk        │         │
//!                           │                      Kernel::handle   │
//!                           │                      Kernel::terminate│
//!                           └───────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `assets` | Static file resolution, content types, streaming |
//! | `config` | [`ProxyConfig`] |
//! | `dispatch` | Per-request pipeline and error mapping |
//! | `in_flight` | Request accounting guard |
//! | `kernel` | [`Kernel`] contract and request/response envelopes |
//! | `listener` | [`ProxyServer`], accept loop, drain |

// ============================================================================
// Submodules
// ============================================================================

mod assets;
mod dispatch;
mod in_flight;
mod listener;

/// Listener configuration.
pub mod config;

/// Application kernel contract.
pub mod kernel;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::ProxyConfig;
pub use dispatch::ProxyBody;
pub use kernel::{AppRequest, AppResponse, Kernel, KernelError};
pub use listener::ProxyServer;
