//! Timestamp management for MVCC transactions
//!
//! This module provides the timestamp type handed out by the oracle and a lock-free
//! cell used to publish the read watermark to readers without taking a lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::TimestampError;

/// A read or commit timestamp used for multi-version concurrency control (MVCC).
///
/// Timestamp 0 is the "nothing committed yet" snapshot: it is a valid read timestamp
/// but is never assigned as a commit timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The empty snapshot.
    pub const ZERO: Timestamp = Timestamp(0);
    /// The largest representable timestamp.
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    /// Create a timestamp from its raw value.
    pub const fn new(ts: u64) -> Self {
        Self(ts)
    }

    /// Returns the raw value of the timestamp.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Returns true for the reserved zero timestamp.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the timestamp right after this one.
    pub fn next(&self) -> Result<Timestamp, TimestampError> {
        self.0
            .checked_add(1)
            .map(Timestamp)
            .ok_or(TimestampError::Overflow(self.0))
    }

    /// Returns the timestamp right before this one, saturating at zero.
    pub fn prev(&self) -> Timestamp {
        Timestamp(self.0.saturating_sub(1))
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A timestamp that can be read without locking and only ever moves forward.
#[derive(Debug, Default)]
pub struct AtomicTimestamp {
    inner: AtomicU64,
}

impl AtomicTimestamp {
    pub fn new(ts: Timestamp) -> Self {
        Self {
            inner: AtomicU64::new(ts.raw()),
        }
    }

    /// Get the current value
    pub fn load(&self) -> Timestamp {
        Timestamp(self.inner.load(Ordering::SeqCst))
    }

    /// Move the value forward to `ts` if it is greater than the current value.
    /// Returns the value after the update.
    pub fn advance_to(&self, ts: Timestamp) -> Timestamp {
        let prev = self.inner.fetch_max(ts.raw(), Ordering::SeqCst);
        Timestamp(prev.max(ts.raw()))
    }
}
