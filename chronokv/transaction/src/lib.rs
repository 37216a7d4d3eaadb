//! Common transaction infrastructure for the chronokv storage engine.
//!
//! This crate provides the timestamp, fingerprint and lifecycle types shared by the
//! oracle and by every transaction implementation built on top of it.

pub mod error;
pub mod fingerprint;
pub mod oracle;
pub mod timestamp;
pub mod transaction;

pub use error::TimestampError;
pub use fingerprint::Fingerprint;
// Re-export commonly used types
pub use oracle::TimestampOracle;
pub use timestamp::{AtomicTimestamp, Timestamp};
pub use transaction::{Transaction, TxnState};
