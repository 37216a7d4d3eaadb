use std::sync::Arc;

use chronokv_transaction::{Timestamp, TimestampOracle};
use tracing::{debug, info};

use crate::config::OracleConfig;
use crate::error::{ModeError, MvccResult, TransactionError};
use crate::oracle::Oracle;
use crate::sequence::Sequence;
use crate::storage::VersionStore;
use crate::txn::Txn;

/// Handle binding one [`Oracle`] to the [`VersionStore`] underneath it.
///
/// Cloning is cheap; every clone and every transaction shares the same oracle.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    oracle: Oracle,
    store: Arc<dyn VersionStore>,
    config: OracleConfig,
}

impl Db {
    /// Create the oracle on top of `store`, seeding its counters from the highest version
    /// already stored.
    pub fn open(store: Arc<dyn VersionStore>, config: OracleConfig) -> MvccResult<Self> {
        config.validate()?;
        let max_version = store.max_version()?;
        let oracle = Oracle::new(&config, max_version)?;
        info!(
            managed = config.managed_txns,
            detect_conflicts = config.detect_conflicts,
            %max_version,
            "oracle opened"
        );
        Ok(Self {
            inner: Arc::new(DbInner {
                oracle,
                store,
                config,
            }),
        })
    }

    /// Begin a transaction reading the latest durable snapshot.
    pub fn new_transaction(&self, update: bool) -> MvccResult<Txn> {
        if self.is_managed() {
            return Err(ModeError::UnsupportedInManagedMode("new_transaction").into());
        }
        Txn::begin(self.clone(), None, update)
    }

    pub(crate) fn new_transaction_at(&self, read_ts: Timestamp, update: bool) -> MvccResult<Txn> {
        Txn::begin(self.clone(), Some(read_ts), update)
    }

    /// Run `f` in an update transaction and commit it if `f` succeeds.
    pub fn update<T, F>(&self, f: F) -> MvccResult<T>
    where
        F: FnOnce(&mut Txn) -> MvccResult<T>,
    {
        if self.is_managed() {
            return Err(ModeError::UnsupportedInManagedMode("update").into());
        }
        let mut txn = self.new_transaction(true)?;
        let value = f(&mut txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Run `f` in a read-only transaction.
    pub fn view<T, F>(&self, f: F) -> MvccResult<T>
    where
        F: FnOnce(&Txn) -> MvccResult<T>,
    {
        if self.is_managed() {
            return Err(ModeError::UnsupportedInManagedMode("view").into());
        }
        let mut txn = self.new_transaction(false)?;
        let value = f(&txn);
        txn.discard();
        value
    }

    /// Lease integers from the sequence stored under `key`, `bandwidth` at a time.
    pub fn get_sequence(&self, key: impl Into<Vec<u8>>, bandwidth: u64) -> MvccResult<Sequence> {
        if self.is_managed() {
            return Err(ModeError::UnsupportedInManagedMode("get_sequence").into());
        }
        let key = key.into();
        if key.is_empty() {
            return Err(TransactionError::EmptyKey.into());
        }
        if bandwidth == 0 {
            return Err(TransactionError::ZeroBandwidth.into());
        }
        Sequence::open(self.clone(), key, bandwidth)
    }

    /// Tell the store that versions shadowed at or below `ts` may be reclaimed.
    /// Rejected while a live or future reader could still see them.
    pub fn purge_below(&self, ts: Timestamp) -> MvccResult<()> {
        self.inner.oracle.purge_below(ts)?;
        self.inner.store.purge_below(ts)?;
        debug!(%ts, "purge below forwarded to store");
        Ok(())
    }

    pub fn oracle(&self) -> &Oracle {
        &self.inner.oracle
    }

    pub fn config(&self) -> &OracleConfig {
        &self.inner.config
    }

    pub fn is_managed(&self) -> bool {
        self.inner.oracle.is_managed()
    }

    pub(crate) fn store(&self) -> &dyn VersionStore {
        self.inner.store.as_ref()
    }
}
