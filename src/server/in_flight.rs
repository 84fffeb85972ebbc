//! In-flight request accounting.
//!
//! Every admitted request holds an [`InFlightGuard`]. The count goes up when
//! the guard is created and down when it is dropped, so each exit path,
//! including errors, panics and abandoned response streams, decrements it
//! exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared in-flight counter.
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    /// Admits one request.
    #[must_use]
    pub(crate) fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&self.0))
    }

    /// Returns the number of admitted, unfinished requests.
    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Marks one request as in flight until dropped.
#[derive(Debug)]
pub(crate) struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
