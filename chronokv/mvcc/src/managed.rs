//! Managed mode: the caller owns the timestamp order.
//!
//! Systems that already run a global clock (a distributed coordinator, a replication log)
//! supply read and commit timestamps themselves. Conflict detection works as usual, but
//! every facility that needs a self-assigned timestamp is unavailable.

use std::ops::Deref;
use std::sync::Arc;

use chronokv_transaction::Timestamp;
use tracing::debug;

use crate::config::OracleConfig;
use crate::db::Db;
use crate::error::MvccResult;
use crate::storage::VersionStore;
use crate::txn::Txn;

/// A [`Db`] opened in managed mode.
///
/// Auto-timestamp entry points of [`Db`] (`new_transaction`, `update`, `view`,
/// `get_sequence`) are reachable through `Deref` but always fail with
/// `UnsupportedInManagedMode`.
#[derive(Clone)]
pub struct ManagedDb {
    db: Db,
}

impl ManagedDb {
    pub fn open(store: Arc<dyn VersionStore>, config: OracleConfig) -> MvccResult<Self> {
        let db = Db::open(store, config.managed_txns(true))?;
        Ok(Self { db })
    }

    /// Begin a transaction reading the snapshot at `read_ts`.
    pub fn new_transaction_at(&self, read_ts: Timestamp, update: bool) -> MvccResult<Txn> {
        self.db.new_transaction_at(read_ts, update)
    }

    /// Remove every version of `key` at or below `ts`. Returns the number of versions removed.
    ///
    /// The caller must make sure nobody reads `key` at or below `ts` any more.
    pub fn purge_versions_below(&self, key: &[u8], ts: Timestamp) -> MvccResult<usize> {
        let mut txn = self.new_transaction_at(ts, false)?;
        let versions = txn.key_versions(key);
        txn.discard();
        let versions = versions?;
        if !versions.is_empty() {
            self.db.store().purge_versions(key, &versions)?;
        }
        debug!(%ts, removed = versions.len(), "purged versions of key");
        Ok(versions.len())
    }

    /// Declare that no transaction will read at or below `ts` again, allowing the conflict
    /// map and old versions to be reclaimed up to it.
    pub fn set_discard_ts(&self, ts: Timestamp) -> MvccResult<()> {
        self.db.oracle().set_discard_ts(ts)
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

impl Deref for ManagedDb {
    type Target = Db;

    fn deref(&self) -> &Db {
        &self.db
    }
}
