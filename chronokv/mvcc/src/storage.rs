//! Interface to the versioned storage layer underneath the oracle.
//!
//! The oracle never touches the LSM tree, the value log or the write-ahead log directly.
//! A storage layer plugs in by implementing [`VersionStore`].

use chronokv_transaction::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// One write of a transaction batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    key: Vec<u8>,
    kind: MutationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Put(Vec<u8>),
    Delete,
}

impl Mutation {
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            kind: MutationKind::Put(value),
        }
    }

    pub fn delete(key: Vec<u8>) -> Self {
        Self {
            key,
            kind: MutationKind::Delete,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    /// Returns the written value, or `None` for a delete.
    pub fn value(&self) -> Option<&[u8]> {
        match &self.kind {
            MutationKind::Put(value) => Some(value),
            MutationKind::Delete => None,
        }
    }

    /// Approximate number of bytes the mutation occupies in a batch.
    pub fn estimate_size(&self) -> usize {
        self.key.len() + self.value().map_or(0, <[u8]>::len) + 1
    }
}

/// A version of a key as stored; `value` is `None` for a delete marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub version: Timestamp,
    pub value: Option<Vec<u8>>,
}

/// Trait implemented by the storage layer.
pub trait VersionStore: Send + Sync {
    /// Highest version present in the store. Seeds the oracle at startup so that
    /// timestamps never regress across restarts.
    fn max_version(&self) -> StoreResult<Timestamp>;

    /// Latest version of `key` with a version at or below `read_ts`.
    fn get(&self, key: &[u8], read_ts: Timestamp) -> StoreResult<Option<VersionedValue>>;

    /// Every version of `key` at or below `read_ts`, newest first, delete markers included.
    fn versions(&self, key: &[u8], read_ts: Timestamp) -> StoreResult<Vec<Timestamp>>;

    /// Persist `batch` atomically at `commit_ts`. Returns once the batch is durable.
    fn write_batch(&self, commit_ts: Timestamp, batch: &[Mutation]) -> StoreResult<()>;

    /// Physically remove the listed versions of `key`.
    fn purge_versions(&self, key: &[u8], versions: &[Timestamp]) -> StoreResult<()>;

    /// Advisory signal: versions shadowed by a newer version at or below `ts` are no longer
    /// visible to any reader and may be reclaimed.
    fn purge_below(&self, ts: Timestamp) -> StoreResult<()>;
}
