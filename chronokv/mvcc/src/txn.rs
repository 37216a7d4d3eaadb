use std::collections::BTreeMap;
use std::sync::Arc;

use chronokv_transaction::{Fingerprint, Timestamp, Transaction, TxnState};
use dashmap::DashSet;
use hashbrown::HashSet;
use parking_lot::Mutex;
use tracing::{error, trace, warn};

use crate::config::MAX_KEY_SIZE;
use crate::db::Db;
use crate::error::{DurabilityError, ModeError, MvccError, MvccResult, TransactionError};
use crate::oracle::CommitRequest;
use crate::storage::{Mutation, StoreResult};

/// Prefix for internal keys; user keys may not start with it.
pub const RESERVED_PREFIX: &[u8] = b"!chronokv!";

/// A key-value pair read by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    key: Vec<u8>,
    value: Vec<u8>,
    version: Timestamp,
}

impl Item {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Commit timestamp of the version, or the read timestamp for the transaction's
    /// own uncommitted writes.
    pub fn version(&self) -> Timestamp {
        self.version
    }
}

/// A transaction reading a fixed snapshot and buffering its writes until commit.
///
/// Dropping an active transaction discards it.
pub struct Txn {
    db: Db,

    // ---- Timestamp management ----
    read_ts: Timestamp,
    commit_ts: Option<Timestamp>,

    update: bool,
    // Shared with the pending commit, which completes the transaction once durable.
    state: Arc<Mutex<TxnState>>,

    // ---- Read set ----
    reads: DashSet<Fingerprint>,

    // ---- Write set ----
    conflict_keys: HashSet<Fingerprint>,
    pending_writes: BTreeMap<Vec<u8>, Mutation>,
    size: usize,
    count: usize,
}

impl Transaction for Txn {
    type Error = MvccError;

    fn read_ts(&self) -> Timestamp {
        self.read_ts
    }

    fn commit_ts(&self) -> Option<Timestamp> {
        self.commit_ts
    }

    fn state(&self) -> TxnState {
        *self.state.lock()
    }

    fn is_update(&self) -> bool {
        self.update
    }
}

impl Txn {
    /// Begin a transaction. `read_ts` is `None` for oracle-assigned snapshots.
    pub(crate) fn begin(db: Db, read_ts: Option<Timestamp>, update: bool) -> MvccResult<Self> {
        let read_ts = db.oracle().begin_read(read_ts)?;
        trace!(%read_ts, update, "transaction started");
        Ok(Self {
            db,
            read_ts,
            commit_ts: None,
            update,
            state: Arc::new(Mutex::new(TxnState::Active)),
            reads: DashSet::new(),
            conflict_keys: HashSet::new(),
            pending_writes: BTreeMap::new(),
            size: 0,
            count: 0,
        })
    }

    /// Read `key` as of the transaction's snapshot.
    ///
    /// Update transactions see their own pending writes and remember the key for conflict
    /// detection at commit.
    pub fn get(&self, key: &[u8]) -> MvccResult<Option<Item>> {
        self.ensure_active()?;
        if key.is_empty() {
            return Err(TransactionError::EmptyKey.into());
        }

        if self.update {
            if let Some(mutation) = self.pending_writes.get(key) {
                return Ok(mutation.value().map(|value| Item {
                    key: key.to_vec(),
                    value: value.to_vec(),
                    version: self.read_ts,
                }));
            }
            self.reads.insert(Fingerprint::of(key));
        }

        let found = self.db.store().get(key, self.read_ts)?;
        Ok(found.and_then(|found| {
            found.value.map(|value| Item {
                key: key.to_vec(),
                value,
                version: found.version,
            })
        }))
    }

    /// Every version of `key` visible at the transaction's snapshot, newest first.
    pub fn key_versions(&self, key: &[u8]) -> MvccResult<Vec<Timestamp>> {
        self.ensure_active()?;
        Ok(self.db.store().versions(key, self.read_ts)?)
    }

    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> MvccResult<()> {
        self.modify(Mutation::put(key.into(), value.into()))
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> MvccResult<()> {
        self.modify(Mutation::delete(key.into()))
    }

    fn modify(&mut self, mutation: Mutation) -> MvccResult<()> {
        if !self.update {
            return Err(TransactionError::ReadOnlyTxn.into());
        }
        self.ensure_active()?;

        let key = mutation.key();
        if key.is_empty() {
            return Err(TransactionError::EmptyKey.into());
        }
        if key.starts_with(RESERVED_PREFIX) {
            return Err(TransactionError::InvalidKey.into());
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(TransactionError::KeyTooLarge {
                size: key.len(),
                max: MAX_KEY_SIZE,
            }
            .into());
        }

        let config = self.db.config();
        let count = self.count + 1;
        let size = self.size + mutation.estimate_size();
        if count > config.max_batch_count || size > config.max_batch_size {
            return Err(TransactionError::TxnTooBig.into());
        }
        self.count = count;
        self.size = size;

        if config.detect_conflicts {
            self.conflict_keys.insert(Fingerprint::of(key));
        }
        self.pending_writes.insert(key.to_vec(), mutation);
        Ok(())
    }

    /// Commit and persist the transaction with an oracle-assigned timestamp.
    ///
    /// Returns `None` when there was nothing to write.
    pub fn commit(&mut self) -> MvccResult<Option<Timestamp>> {
        match self.prepare_commit(None)? {
            Some(pending) => pending.persist().map(Some),
            None => Ok(None),
        }
    }

    /// Commit and persist the transaction at a caller-supplied timestamp (managed mode).
    pub fn commit_at(&mut self, commit_ts: Timestamp) -> MvccResult<Option<Timestamp>> {
        if !self.db.is_managed() {
            return Err(ModeError::ManagedOnly("commit_at").into());
        }
        match self.prepare_commit(Some(commit_ts))? {
            Some(pending) => pending.persist().map(Some),
            None => Ok(None),
        }
    }

    /// Assign a commit timestamp and hand the batch to the caller, who persists it and
    /// resolves the returned [`PendingCommit`].
    pub fn commit_deferred(&mut self) -> MvccResult<Option<PendingCommit>> {
        self.prepare_commit(None)
    }

    /// Managed-mode variant of [`Txn::commit_deferred`].
    pub fn commit_deferred_at(
        &mut self,
        commit_ts: Timestamp,
    ) -> MvccResult<Option<PendingCommit>> {
        if !self.db.is_managed() {
            return Err(ModeError::ManagedOnly("commit_deferred_at").into());
        }
        self.prepare_commit(Some(commit_ts))
    }

    /// Discard the transaction. Calling this on a finished transaction is a no-op.
    pub fn discard(&mut self) {
        if self.state() == TxnState::Active {
            self.finish(TxnState::Discarded);
        }
    }

    fn prepare_commit(
        &mut self,
        commit_ts: Option<Timestamp>,
    ) -> MvccResult<Option<PendingCommit>> {
        self.ensure_active()?;
        if self.pending_writes.is_empty() {
            self.finish(TxnState::Discarded);
            return Ok(None);
        }
        if self.db.is_managed() && commit_ts.is_none() {
            return Err(ModeError::CommitTsRequired.into());
        }

        let reads: Vec<Fingerprint> = self.reads.iter().map(|fp| *fp).collect();
        let writes: Vec<Fingerprint> = self.conflict_keys.iter().copied().collect();
        let assigned = self.db.oracle().new_commit_ts(&CommitRequest {
            read_ts: self.read_ts,
            commit_ts,
            reads: &reads,
            writes: &writes,
        });

        match assigned {
            Ok(commit_ts) => {
                self.commit_ts = Some(commit_ts);
                self.finish(TxnState::PendingDurable);
                let batch = std::mem::take(&mut self.pending_writes)
                    .into_values()
                    .collect();
                Ok(Some(PendingCommit {
                    db: self.db.clone(),
                    state: self.state.clone(),
                    commit_ts,
                    batch,
                    resolved: false,
                }))
            }
            Err(MvccError::Mode(e)) => Err(e.into()),
            Err(e) => {
                self.finish(TxnState::Discarded);
                Err(e)
            }
        }
    }

    fn finish(&mut self, next: TxnState) {
        {
            let mut state = self.state.lock();
            debug_assert!(state.can_transition_to(next));
            *state = next;
        }
        self.db.oracle().end_read(self.read_ts);
        trace!(read_ts = %self.read_ts, state = %next, "transaction finished");
    }

    fn ensure_active(&self) -> MvccResult<()> {
        if self.state() != TxnState::Active {
            return Err(TransactionError::DiscardedTxn.into());
        }
        Ok(())
    }
}

impl Drop for Txn {
    fn drop(&mut self) {
        self.discard();
    }
}

/// A commit whose timestamp is assigned but whose batch is not yet known to be durable.
///
/// The storage layer persists [`PendingCommit::batch`] and calls
/// [`PendingCommit::notify_durable`] exactly once. Until then the read watermark cannot move
/// past this commit.
#[must_use = "the read watermark stalls until the pending commit is resolved"]
pub struct PendingCommit {
    db: Db,
    state: Arc<Mutex<TxnState>>,
    commit_ts: Timestamp,
    batch: Vec<Mutation>,
    resolved: bool,
}

impl PendingCommit {
    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts
    }

    pub fn batch(&self) -> &[Mutation] {
        &self.batch
    }

    /// Write the batch through the database's store and resolve the commit.
    pub fn persist(self) -> MvccResult<Timestamp> {
        let outcome = self.db.store().write_batch(self.commit_ts, &self.batch);
        self.notify_durable(outcome)
    }

    /// Resolve the commit with the outcome of persisting its batch.
    ///
    /// On success the transaction is committed and becomes visible once every earlier commit
    /// is durable too. On failure the transaction stays pending durable and the watermark
    /// does not advance past its timestamp.
    pub fn notify_durable(mut self, outcome: StoreResult<()>) -> MvccResult<Timestamp> {
        self.resolved = true;
        match outcome {
            Ok(()) => {
                self.db.oracle().done_commit(self.commit_ts)?;
                *self.state.lock() = TxnState::Committed;
                Ok(self.commit_ts)
            }
            Err(source) => {
                error!(
                    commit_ts = %self.commit_ts,
                    %source,
                    "commit batch failed to persist, read watermark is stalled"
                );
                Err(DurabilityError::Persist {
                    commit_ts: self.commit_ts,
                    source,
                }
                .into())
            }
        }
    }
}

impl Drop for PendingCommit {
    fn drop(&mut self) {
        if !self.resolved {
            warn!(
                commit_ts = %self.commit_ts,
                "pending commit dropped without a durability outcome, read watermark is stalled"
            );
        }
    }
}
