//! Timestamp oracle trait and related functionality
//!
//! This module defines the interface that hands out read timestamps, learns about
//! durable commits, and reports the watermark below which old versions may be reclaimed.

use crate::Timestamp;

/// Trait for timestamp oracles supporting MVCC operations.
///
/// Implementations are shared between threads; every method takes `&self`.
pub trait TimestampOracle {
    /// The error type for operations
    type Error;

    /// Returns true if timestamps are supplied by the caller instead of the oracle.
    fn is_managed(&self) -> bool;

    /// Get a snapshot timestamp for a new reader.
    /// Managed oracles reject this call because readers bring their own timestamp.
    fn read_timestamp(&self) -> Result<Timestamp, Self::Error>;

    /// Report that the batch committed at `commit_ts` is durable.
    /// This may be called in any order relative to other commits.
    fn notify_durable(&self, commit_ts: Timestamp) -> Result<(), Self::Error>;

    /// Check that versions below `ts` may be physically removed.
    fn purge_below(&self, ts: Timestamp) -> Result<(), Self::Error>;

    /// Get the low watermark of the oracle.
    /// Every commit at or below the watermark is durable and visible to new readers.
    fn low_watermark(&self) -> Timestamp;
}
