//! Latest-request-wins ordering for overlapping insight calls
//!
//! When a view re-requests an analysis while an earlier one is in flight,
//! the earlier completion may arrive last. Each request takes a `Ticket`;
//! only the most recently issued ticket may deliver its result.

use std::sync::atomic::{AtomicU64, Ordering};

/// Handle identifying one issued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding all earlier tickets
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Pass `value` through only if `ticket` has not been superseded
    pub fn accept<T>(&self, ticket: Ticket, value: T) -> Option<T> {
        self.is_current(ticket).then_some(value)
    }
}
