//! Automation command protocol.
//!
//! Commands are plain JSON over HTTP. This module knows how to route a
//! command to its endpoint and how to read the answer; it does no IO.
//!
//! # Flow
//!
//! ```text
//! WebDriverCommand ──► PreparedRequest ──► (transport) ──► decode_response ──► WebDriverResponse
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `capabilities` | Capability map and dialect translation |
//! | `command` | Command names, routing table, parameters |
//! | `request` | Request preparation and payload encoding |
//! | `response` | Response decoding and error detection |

// ============================================================================
// Submodules
// ============================================================================

/// Capability map and dialect translation.
pub mod capabilities;

/// Command names and routing table.
pub mod command;

/// Outbound request preparation.
pub mod request;

/// Response decoding.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use capabilities::Capabilities;
pub use command::{CommandName, WebDriverCommand};
pub use request::{PreparedRequest, encode_payload};
pub use response::{WebDriverResponse, decode_response};
