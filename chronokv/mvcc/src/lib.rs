//! MVCC timestamp oracle for an LSM-based key-value engine.
//!
//! The [`Oracle`] hands out read and commit timestamps, detects conflicts between
//! concurrent transactions and tracks the read watermark below which old versions become
//! garbage. [`Db`] binds an oracle to a [`VersionStore`] and creates [`Txn`]s;
//! [`ManagedDb`] is the variant where the caller supplies every timestamp.

pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod managed;
pub mod oracle;
pub mod sequence;
pub mod storage;
pub mod txn;
pub mod watermark;

pub use chronokv_transaction::{
    AtomicTimestamp, Fingerprint, Timestamp, TimestampError, TimestampOracle, Transaction,
    TxnState,
};
pub use config::OracleConfig;
pub use db::Db;
pub use error::{
    ConfigError, DurabilityError, ModeError, MvccError, MvccResult, StoreError, TransactionError,
};
pub use managed::ManagedDb;
pub use oracle::{CommitRequest, Oracle};
pub use sequence::Sequence;
pub use storage::{Mutation, MutationKind, StoreResult, VersionStore, VersionedValue};
pub use txn::{Item, PendingCommit, RESERVED_PREFIX, Txn};
