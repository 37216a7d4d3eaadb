use std::sync::atomic::{AtomicI64, Ordering};

use chronokv_transaction::{AtomicTimestamp, Fingerprint, Timestamp, TimestampOracle};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::OracleConfig;
use crate::conflict::ConflictTracker;
use crate::error::{ModeError, MvccError, MvccResult, TransactionError};
use crate::watermark::{ReadMark, WatermarkHeap};

/// What a committing transaction hands to the oracle.
#[derive(Debug, Clone, Copy)]
pub struct CommitRequest<'a> {
    /// Snapshot the transaction read from.
    pub read_ts: Timestamp,
    /// Caller-supplied commit timestamp, managed mode only.
    pub commit_ts: Option<Timestamp>,
    /// Fingerprints of the keys the transaction read.
    pub reads: &'a [Fingerprint],
    /// Fingerprints of the keys the transaction wrote.
    pub writes: &'a [Fingerprint],
}

/// Single source of truth for timestamp assignment and conflict detection.
///
/// Readers only load `cur_read`; everything a commit touches lives behind `inner` and is
/// updated in short critical sections that never wait on I/O. The read mark has its own
/// lock and is always acquired after `inner` when both are needed.
#[derive(Debug)]
pub struct Oracle {
    is_managed: bool,
    detect_conflicts: bool,
    conflict_map_soft_limit: usize,
    /// Every commit at or below this timestamp is durable.
    cur_read: AtomicTimestamp,
    /// Managed mode only: the caller promises not to read below this timestamp.
    discard_ts: AtomicTimestamp,
    /// References to the conflict map held by live transactions and pending commits.
    ref_count: AtomicI64,
    inner: Mutex<OracleInner>,
    read_mark: Mutex<ReadMark>,
}

#[derive(Debug)]
struct OracleInner {
    next_commit: Timestamp,
    commit_mark: WatermarkHeap,
    commits: ConflictTracker,
    /// Map size that triggers the next soft-limit eviction while readers pin the floor.
    next_eviction_at: usize,
}

impl Oracle {
    /// Create an oracle whose first commit lands right after `max_version`, the highest
    /// version already present in storage.
    pub fn new(config: &OracleConfig, max_version: Timestamp) -> MvccResult<Self> {
        let next_commit = max_version.next()?;
        debug!(
            managed = config.managed_txns,
            %max_version,
            "oracle seeded from storage"
        );
        Ok(Self {
            is_managed: config.managed_txns,
            detect_conflicts: config.detect_conflicts,
            conflict_map_soft_limit: config.conflict_map_soft_limit,
            cur_read: AtomicTimestamp::new(max_version),
            discard_ts: AtomicTimestamp::default(),
            ref_count: AtomicI64::new(0),
            inner: Mutex::new(OracleInner {
                next_commit,
                commit_mark: WatermarkHeap::new(),
                commits: ConflictTracker::new(),
                next_eviction_at: 0,
            }),
            read_mark: Mutex::new(ReadMark::new()),
        })
    }

    /// Register a new reader. Normal mode hands out the current watermark; managed mode
    /// takes the caller's timestamp.
    pub(crate) fn begin_read(&self, read_ts: Option<Timestamp>) -> MvccResult<Timestamp> {
        match (self.is_managed, read_ts) {
            (true, None) => {
                return Err(ModeError::UnsupportedInManagedMode("new_transaction").into());
            }
            (false, Some(_)) => return Err(ModeError::ManagedOnly("new_transaction_at").into()),
            _ => {}
        }

        // The reference must be visible before the watermark is loaded, so a concurrent
        // cleanup either sees this reader or runs entirely below its snapshot.
        self.add_ref();
        let mut read_mark = self.read_mark.lock();
        let read_ts = read_ts.unwrap_or_else(|| self.cur_read.load());
        read_mark.begin(read_ts);
        Ok(read_ts)
    }

    /// Release a reader registered by [`Oracle::begin_read`].
    pub(crate) fn end_read(&self, read_ts: Timestamp) {
        let released = self.read_mark.lock().done(read_ts);
        debug_assert!(released, "reader at {read_ts} was not registered");
        self.decr_ref();
    }

    /// Check the transaction for conflicts and assign its commit timestamp.
    ///
    /// On success the timestamp is pending until [`Oracle::done_commit`] is called for it.
    /// A conflict assigns nothing and leaves the oracle untouched.
    pub fn new_commit_ts(&self, request: &CommitRequest<'_>) -> MvccResult<Timestamp> {
        match (self.is_managed, request.commit_ts) {
            (false, Some(_)) => return Err(ModeError::ManagedOnly("commit_at").into()),
            (true, None) => return Err(ModeError::CommitTsRequired.into()),
            (true, Some(ts)) if ts.is_zero() => return Err(ModeError::CommitTsRequired.into()),
            _ => {}
        }

        let mut inner = self.inner.lock();

        if self.detect_conflicts {
            if let Some((fp, committed_at)) =
                inner.commits.find_conflict(request.reads, request.read_ts)
            {
                debug!(
                    read_ts = %request.read_ts,
                    %committed_at,
                    fingerprint = fp.raw(),
                    "read set invalidated by a later commit"
                );
                return Err(TransactionError::Conflict.into());
            }
        }

        let commit_ts = match request.commit_ts {
            Some(ts) => {
                inner.next_commit = inner.next_commit.max(ts.next()?);
                ts
            }
            None => {
                let ts = inner.next_commit;
                inner.next_commit = ts.next()?;
                ts
            }
        };

        if self.detect_conflicts {
            inner.commits.record(request.writes, commit_ts);
        }
        inner.commit_mark.insert(commit_ts);
        self.add_ref();

        let limit = self.conflict_map_soft_limit;
        if limit > 0 && inner.commits.len() > limit.max(inner.next_eviction_at) {
            let floor = self.live_read_floor();
            let evicted = inner.commits.evict_at_or_below(floor);
            let remaining = inner.commits.len();
            // Entries still pinned by old readers are not scanned again until the map doubles.
            inner.next_eviction_at = if remaining > limit {
                remaining.saturating_mul(2)
            } else {
                0
            };
            debug!(evicted, remaining, %floor, "conflict map over soft limit");
        }

        trace!(%commit_ts, read_ts = %request.read_ts, "assigned commit timestamp");
        Ok(commit_ts)
    }

    /// Mark the commit at `commit_ts` as durable and advance the read watermark.
    ///
    /// Commits may become durable in any order. The watermark only moves up to just below
    /// the oldest commit that is still pending, so a later commit never becomes visible
    /// before an earlier one.
    pub fn done_commit(&self, commit_ts: Timestamp) -> MvccResult<()> {
        let mut inner = self.inner.lock();
        if !inner.commit_mark.remove(commit_ts) {
            return Err(TransactionError::UnknownCommit(commit_ts).into());
        }
        let done_until = match inner.commit_mark.peek_min() {
            Some(oldest_pending) => oldest_pending.prev(),
            None => inner.next_commit.prev(),
        };
        let cur_read = self.cur_read.advance_to(done_until);
        trace!(
            %commit_ts,
            %cur_read,
            pending = inner.commit_mark.len(),
            "commit durable"
        );
        drop(inner);

        self.decr_ref();
        Ok(())
    }

    /// Declare that no managed transaction will read below `ts` any more.
    pub fn set_discard_ts(&self, ts: Timestamp) -> MvccResult<()> {
        if !self.is_managed {
            return Err(ModeError::ManagedOnly("set_discard_ts").into());
        }
        self.discard_ts.advance_to(ts);

        let mut inner = self.inner.lock();
        let floor = self.live_read_floor();
        let evicted = inner.commits.evict_at_or_below(floor);
        if evicted > 0 {
            inner.next_eviction_at = 0;
        }
        trace!(%ts, evicted, "discard timestamp advanced");
        Ok(())
    }

    /// Versions that are shadowed by a newer version at or below the returned timestamp
    /// are invisible to every live and future reader.
    pub fn discard_at_or_below(&self) -> Timestamp {
        self.live_read_floor()
    }

    /// The next commit timestamp the oracle would hand out.
    pub fn next_commit_ts(&self) -> Timestamp {
        self.inner.lock().next_commit
    }

    /// Number of commits assigned but not yet durable.
    pub fn pending_commits(&self) -> usize {
        self.inner.lock().commit_mark.len()
    }

    /// Number of fingerprints currently tracked for conflict detection.
    pub fn conflict_map_len(&self) -> usize {
        self.inner.lock().commits.len()
    }

    /// Latest tracked commit of `key`, if it is still in the conflict map.
    pub fn last_commit_of(&self, key: &[u8]) -> Option<Timestamp> {
        self.inner.lock().commits.get(Fingerprint::of(key))
    }

    pub fn ref_count(&self) -> i64 {
        self.ref_count.load(Ordering::SeqCst)
    }

    fn add_ref(&self) {
        self.ref_count.fetch_add(1, Ordering::SeqCst);
    }

    fn decr_ref(&self) {
        if self.ref_count.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }

        let mut inner = self.inner.lock();
        // Another transaction may have started between the decrement and the lock.
        if self.ref_count.load(Ordering::SeqCst) != 0 {
            return;
        }
        let floor = self.future_read_floor();
        let evicted = inner.commits.evict_at_or_below(floor);
        if evicted > 0 {
            inner.next_eviction_at = 0;
            trace!(evicted, %floor, "conflict map cleaned up");
        }
    }

    /// Lowest read timestamp a transaction that has not started yet can hold.
    fn future_read_floor(&self) -> Timestamp {
        let cur_read = self.cur_read.load();
        if self.is_managed {
            cur_read.min(self.discard_ts.load())
        } else {
            cur_read
        }
    }

    /// Lowest read timestamp any live or future transaction can hold.
    fn live_read_floor(&self) -> Timestamp {
        let read_mark = self.read_mark.lock();
        let floor = self.future_read_floor();
        read_mark.min().map_or(floor, |oldest| oldest.min(floor))
    }
}

impl TimestampOracle for Oracle {
    type Error = MvccError;

    fn is_managed(&self) -> bool {
        self.is_managed
    }

    fn read_timestamp(&self) -> MvccResult<Timestamp> {
        if self.is_managed {
            return Err(ModeError::UnsupportedInManagedMode("read_timestamp").into());
        }
        Ok(self.cur_read.load())
    }

    fn notify_durable(&self, commit_ts: Timestamp) -> MvccResult<()> {
        self.done_commit(commit_ts)
    }

    fn purge_below(&self, ts: Timestamp) -> MvccResult<()> {
        let safe = self.discard_at_or_below();
        if ts > safe {
            return Err(TransactionError::PurgeAboveWatermark { requested: ts, safe }.into());
        }
        Ok(())
    }

    fn low_watermark(&self) -> Timestamp {
        self.cur_read.load()
    }
}
