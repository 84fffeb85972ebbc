//! URL rewriting between the application origin and the proxy listener.
//!
//! Links the application generates for its own host are pointed at the
//! proxy listener, with the original origin carried in a query token. The
//! listener strips the token and restores the origin before dispatch.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `generator` | [`UrlGenerator`] trait and the rewriting decorator |
//! | `token` | Origin token encoding and URL (un)rewriting |

// ============================================================================
// Submodules
// ============================================================================

/// Link generation decorator.
pub mod generator;

/// Rewrite token codec.
pub mod token;

// ============================================================================
// Re-exports
// ============================================================================

pub use generator::{Parameters, ProxiedUrlGenerator, UrlGenerator, UrlResult};
pub use token::{Origin, TOKEN_KEY, rewrite, strip_token, unrewrite};
