//! Change channel for collection updates
//!
//! Every notification the store delivers is also published here as a
//! `ChangeEvent`. Other parts of a program (a background task, a UI loop)
//! can `listen()` without registering a snapshot callback.
//!
//! The channel is lossy: a receiver that falls behind skips events
//! (`RecvError::Lagged`). That only leaves a view stale until the next read,
//! because the stored collection is always authoritative.

use tokio::sync::broadcast;
use tracing::trace;

use crate::models::Collection;

/// Buffered events per receiver before it starts lagging
const CHANNEL_CAPACITY: usize = 64;

/// What happened to a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    ExpenseAdded,
    ExpenseReplaced,
    ExpenseDeleted,
    BudgetUpserted,
    /// Missing budget entries were synthesized and written back
    BudgetsReconciled,
}

/// Why a collection changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Written through this process's store
    Local(Mutation),
    /// Written by another process sharing the same storage
    External,
}

/// Message carried on the change channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub reason: ChangeReason,
}

impl ChangeEvent {
    pub fn local(collection: Collection, mutation: Mutation) -> Self {
        Self {
            collection,
            reason: ChangeReason::Local(mutation),
        }
    }

    pub fn external(collection: Collection) -> Self {
        Self {
            collection,
            reason: ChangeReason::External,
        }
    }
}

/// Broadcast channel of `ChangeEvent`s
#[derive(Clone)]
pub struct ChangeChannel {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Having no listeners is fine.
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        trace!(collection = %event.collection, reason = ?event.reason, receivers, "Published change");
    }

    /// Receive every event published from now on
    pub fn listen(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeChannel {
    fn default() -> Self {
        Self::new()
    }
}
