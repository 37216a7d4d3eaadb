mod common;

use chronokv_mvcc::{
    DurabilityError, MvccError, StoreError, TimestampOracle, Transaction, TransactionError,
    TxnState, VersionStore,
};
use common::*;

#[test]
fn test_failed_persist_stalls_watermark() {
    let store = MemStore::new();
    let db = open_db(&store);

    store.set_fail_writes(true);
    let mut txn = db.new_transaction(true).unwrap();
    txn.set("a", "1").unwrap();
    let err = txn.commit().unwrap_err();
    assert!(matches!(
        err,
        MvccError::Durability(DurabilityError::Persist { commit_ts, .. }) if commit_ts == ts(1)
    ));
    assert!(!err.is_retryable());
    assert_eq!(txn.state(), TxnState::PendingDurable);

    store.set_fail_writes(false);
    db.update(|txn| txn.set("b", "2")).unwrap();

    // Commit 2 is durable but 1 never will be.
    assert_eq!(db.oracle().pending_commits(), 1);
    assert_eq!(db.oracle().low_watermark(), ts(0));
    let reader = db.new_transaction(false).unwrap();
    assert_eq!(reader.read_ts(), ts(0));
    assert!(reader.get(b"b").unwrap().is_none());
}

#[test]
fn test_deferred_commits_resolved_out_of_order() {
    let store = MemStore::new();
    let db = open_db(&store);

    let mut commits = Vec::new();
    for key in ["a", "b", "c"] {
        let mut txn = db.new_transaction(true).unwrap();
        txn.set(key, key).unwrap();
        let pending = txn.commit_deferred().unwrap().unwrap();
        assert_eq!(txn.state(), TxnState::PendingDurable);
        assert_eq!(pending.batch().len(), 1);
        commits.push(pending);
    }
    let c3 = commits.pop().unwrap();
    let c2 = commits.pop().unwrap();
    let c1 = commits.pop().unwrap();

    let outcome = store.write_batch(c3.commit_ts(), c3.batch());
    assert_eq!(c3.notify_durable(outcome).unwrap(), ts(3));
    assert_eq!(db.oracle().low_watermark(), ts(0));

    let outcome = store.write_batch(c1.commit_ts(), c1.batch());
    c1.notify_durable(outcome).unwrap();
    assert_eq!(db.oracle().low_watermark(), ts(1));

    let outcome = store.write_batch(c2.commit_ts(), c2.batch());
    c2.notify_durable(outcome).unwrap();
    assert_eq!(db.oracle().low_watermark(), ts(3));

    let reader = db.new_transaction(false).unwrap();
    for key in [b"a", b"b", b"c"] {
        assert!(reader.get(key).unwrap().is_some());
    }
}

#[test]
fn test_notify_durable_with_store_error() {
    let store = MemStore::new();
    let db = open_db(&store);

    let mut txn = db.new_transaction(true).unwrap();
    txn.set("a", "1").unwrap();
    let pending = txn.commit_deferred().unwrap().unwrap();
    let err = pending
        .notify_durable(Err(StoreError::Backend("disk full".to_string())))
        .unwrap_err();
    assert!(matches!(err, MvccError::Durability(_)));
    assert_eq!(txn.state(), TxnState::PendingDurable);
    assert_eq!(db.oracle().pending_commits(), 1);
    assert_eq!(db.oracle().low_watermark(), ts(0));
}

#[test]
fn test_durable_deferred_commit_completes_transaction() {
    let store = MemStore::new();
    let db = open_db(&store);

    let mut first = db.new_transaction(true).unwrap();
    first.set("a", "1").unwrap();
    let mut second = db.new_transaction(true).unwrap();
    second.set("b", "2").unwrap();
    let c1 = first.commit_deferred().unwrap().unwrap();
    let c2 = second.commit_deferred().unwrap().unwrap();

    // Durable but not yet visible: commit 1 is still outstanding.
    c2.persist().unwrap();
    assert_eq!(second.state(), TxnState::Committed);
    assert_eq!(first.state(), TxnState::PendingDurable);
    assert_eq!(db.oracle().low_watermark(), ts(0));

    let outcome = store.write_batch(c1.commit_ts(), c1.batch());
    c1.notify_durable(outcome).unwrap();
    assert_eq!(first.state(), TxnState::Committed);
    assert_eq!(first.commit_ts(), Some(ts(1)));
    assert_eq!(db.oracle().low_watermark(), ts(2));
}

#[test]
fn test_dropped_pending_commit_stays_pending() {
    let store = MemStore::new();
    let db = open_db(&store);

    let mut txn = db.new_transaction(true).unwrap();
    txn.set("a", "1").unwrap();
    drop(txn.commit_deferred().unwrap());
    assert_eq!(db.oracle().pending_commits(), 1);
    assert_eq!(db.oracle().ref_count(), 1);

    // The oracle can still be told directly once the batch is known to be durable.
    db.oracle().notify_durable(ts(1)).unwrap();
    assert_eq!(db.oracle().low_watermark(), ts(1));
    assert!(matches!(
        db.oracle().notify_durable(ts(1)),
        Err(MvccError::Transaction(TransactionError::UnknownCommit(_)))
    ));
}
