#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chronokv_mvcc::{
    Db, ManagedDb, Mutation, OracleConfig, StoreError, StoreResult, Timestamp, VersionStore,
    VersionedValue,
};
use parking_lot::RwLock;

/// In-memory version store. Versions of a key are kept oldest first.
#[derive(Default)]
pub struct MemStore {
    versions: RwLock<BTreeMap<Vec<u8>, Vec<(Timestamp, Option<Vec<u8>>)>>>,
    max_version: RwLock<Timestamp>,
    fail_writes: AtomicBool,
    purged_below: RwLock<Option<Timestamp>>,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_max_version(max_version: u64) -> Arc<Self> {
        let store = Self::default();
        *store.max_version.write() = Timestamp::new(max_version);
        Arc::new(store)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn version_count(&self, key: &[u8]) -> usize {
        self.versions.read().get(key).map_or(0, Vec::len)
    }

    pub fn purged_below(&self) -> Option<Timestamp> {
        *self.purged_below.read()
    }
}

impl VersionStore for MemStore {
    fn max_version(&self) -> StoreResult<Timestamp> {
        Ok(*self.max_version.read())
    }

    fn get(&self, key: &[u8], read_ts: Timestamp) -> StoreResult<Option<VersionedValue>> {
        let versions = self.versions.read();
        Ok(versions.get(key).and_then(|list| {
            list.iter()
                .rev()
                .find(|(version, _)| *version <= read_ts)
                .map(|(version, value)| VersionedValue {
                    version: *version,
                    value: value.clone(),
                })
        }))
    }

    fn versions(&self, key: &[u8], read_ts: Timestamp) -> StoreResult<Vec<Timestamp>> {
        let versions = self.versions.read();
        Ok(versions
            .get(key)
            .map(|list| {
                list.iter()
                    .rev()
                    .map(|(version, _)| *version)
                    .filter(|version| *version <= read_ts)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn write_batch(&self, commit_ts: Timestamp, batch: &[Mutation]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        let mut versions = self.versions.write();
        for mutation in batch {
            let list = versions.entry(mutation.key().to_vec()).or_default();
            let value = mutation.value().map(<[u8]>::to_vec);
            let pos = list.partition_point(|(version, _)| *version <= commit_ts);
            list.insert(pos, (commit_ts, value));
        }
        let mut max_version = self.max_version.write();
        *max_version = (*max_version).max(commit_ts);
        Ok(())
    }

    fn purge_versions(&self, key: &[u8], purge: &[Timestamp]) -> StoreResult<()> {
        let mut versions = self.versions.write();
        if let Some(list) = versions.get_mut(key) {
            list.retain(|(version, _)| !purge.contains(version));
        }
        Ok(())
    }

    fn purge_below(&self, ts: Timestamp) -> StoreResult<()> {
        *self.purged_below.write() = Some(ts);
        Ok(())
    }
}

pub fn open_db(store: &Arc<MemStore>) -> Db {
    Db::open(store.clone(), OracleConfig::default()).unwrap()
}

pub fn open_db_with(store: &Arc<MemStore>, config: OracleConfig) -> Db {
    Db::open(store.clone(), config).unwrap()
}

pub fn open_managed(store: &Arc<MemStore>) -> ManagedDb {
    ManagedDb::open(store.clone(), OracleConfig::default()).unwrap()
}

pub fn ts(raw: u64) -> Timestamp {
    Timestamp::new(raw)
}
