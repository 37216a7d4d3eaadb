use chronokv_transaction::{Timestamp, TimestampError};
use thiserror::Error;

pub type MvccResult<T> = Result<T, MvccError>;

#[derive(Error, Debug)]
pub enum MvccError {
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Mode error: {0}")]
    Mode(#[from] ModeError),
    #[error("Durability error: {0}")]
    Durability(#[from] DurabilityError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Timestamp error: {0}")]
    Timestamp(#[from] TimestampError),
}

impl MvccError {
    /// Returns true if a commit lost a conflict against a concurrent writer.
    pub fn is_conflict(&self) -> bool {
        matches!(self, MvccError::Transaction(TransactionError::Conflict))
    }

    /// Returns true if retrying the transaction from a fresh snapshot may succeed.
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }
}

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction Conflict. Please retry")]
    Conflict,
    #[error("No sets or deletes are allowed in a read-only transaction")]
    ReadOnlyTxn,
    #[error("This transaction has been discarded. Create a new one")]
    DiscardedTxn,
    #[error("Txn is too big to fit into one request")]
    TxnTooBig,
    #[error("Key cannot be empty")]
    EmptyKey,
    #[error("Key is using a reserved prefix")]
    InvalidKey,
    #[error("Key with size {size} exceeded {max} limit")]
    KeyTooLarge { size: usize, max: usize },
    #[error("Commit timestamp {0} is not pending")]
    UnknownCommit(Timestamp),
    #[error("Cannot purge below {requested}: versions above {safe} may still be read")]
    PurgeAboveWatermark {
        requested: Timestamp,
        safe: Timestamp,
    },
    #[error("Bandwidth must be greater than zero")]
    ZeroBandwidth,
    #[error("Sequence lease error: {0}")]
    SequenceLease(String),
}

/// Operations invoked in the wrong timestamp mode. These never change any state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("{0} is not supported in managed mode, timestamps must be supplied by the caller")]
    UnsupportedInManagedMode(&'static str),
    #[error("{0} can only be used in managed mode")]
    ManagedOnly(&'static str),
    #[error("Commit timestamp cannot be zero, use commit_at in managed mode")]
    CommitTsRequired,
}

#[derive(Error, Debug)]
pub enum DurabilityError {
    #[error("Commit at {commit_ts} failed to persist and stays pending: {source}")]
    Persist {
        commit_ts: Timestamp,
        source: StoreError,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
