//! Transaction trait and related functionality
//!
//! This module defines the transaction lifecycle shared by every transaction
//! implementation built on top of the oracle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// Lifecycle state of a transaction.
///
/// ```text
/// Active --commit--> PendingDurable --durable--> Committed
///   |
///   +----discard / conflict----> Discarded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnState {
    /// Reads and writes are accepted.
    Active,
    /// A commit timestamp was assigned and the batch is waiting to become durable.
    PendingDurable,
    /// The batch is durable and visible to readers at or above the commit timestamp.
    Committed,
    /// The transaction was discarded or lost a conflict.
    Discarded,
}

impl TxnState {
    /// Returns true once no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxnState::Committed | TxnState::Discarded)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TxnState) -> bool {
        use TxnState::*;
        matches!(
            (self, next),
            (Active, PendingDurable) | (Active, Discarded) | (PendingDurable, Committed)
        )
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxnState::Active => "active",
            TxnState::PendingDurable => "pending-durable",
            TxnState::Committed => "committed",
            TxnState::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// Trait defining the core operations that all transactions must support.
pub trait Transaction {
    /// The error type for transaction operations
    type Error;

    /// Get the snapshot timestamp of the transaction
    fn read_ts(&self) -> Timestamp;

    /// Get the commit timestamp of the transaction, once assigned
    fn commit_ts(&self) -> Option<Timestamp>;

    /// Get the lifecycle state of the transaction
    fn state(&self) -> TxnState;

    /// Returns true if the transaction may write
    fn is_update(&self) -> bool;
}
