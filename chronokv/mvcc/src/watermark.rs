//! Watermark bookkeeping for the oracle.
//!
//! [`WatermarkHeap`] tracks commit timestamps that are assigned but not yet durable, and
//! [`ReadMark`] tracks the snapshots held by live transactions. Neither is thread-safe on
//! its own; the oracle keeps each one behind a lock.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use chronokv_transaction::Timestamp;
use hashbrown::HashMap;

/// Min-heap of pending commit timestamps.
///
/// Commits may become durable in any order, so removal is arbitrary. A removed timestamp
/// only leaves the pending multiset; its heap entry is dropped lazily once it reaches the
/// top. Heap and multiset entries for the same commit are always updated together.
#[derive(Debug, Default)]
pub struct WatermarkHeap {
    heap: BinaryHeap<Reverse<Timestamp>>,
    pending: HashMap<Timestamp, usize>,
    len: usize,
}

impl WatermarkHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending commit. Managed transactions may share a commit timestamp, so the
    /// same timestamp can be inserted more than once.
    pub fn insert(&mut self, ts: Timestamp) {
        self.heap.push(Reverse(ts));
        *self.pending.entry(ts).or_insert(0) += 1;
        self.len += 1;
    }

    /// Mark one pending commit at `ts` as done. Returns false if `ts` was not pending.
    pub fn remove(&mut self, ts: Timestamp) -> bool {
        let Some(count) = self.pending.get_mut(&ts) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.pending.remove(&ts);
        }
        self.len -= 1;
        self.prune();
        true
    }

    /// Lowest timestamp that is still pending.
    pub fn peek_min(&self) -> Option<Timestamp> {
        self.heap.peek().map(|Reverse(ts)| *ts)
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.pending.contains_key(&ts)
    }

    /// Number of pending commits, counting shared timestamps once per commit.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn prune(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.pending.contains_key(top) {
                break;
            }
            self.heap.pop();
        }
        // Duplicate entries of a still-pending timestamp may outnumber its count.
        if self.heap.len() > 2 * self.len.max(16) {
            self.compact();
        }
    }

    fn compact(&mut self) {
        self.heap = self
            .pending
            .iter()
            .flat_map(|(ts, count)| std::iter::repeat_n(Reverse(*ts), *count))
            .collect();
    }
}

/// Multiset of read timestamps held by live transactions.
#[derive(Debug, Default)]
pub struct ReadMark {
    active: BTreeMap<Timestamp, usize>,
}

impl ReadMark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, read_ts: Timestamp) {
        *self.active.entry(read_ts).or_insert(0) += 1;
    }

    /// Returns false if no reader was registered at `read_ts`.
    pub fn done(&mut self, read_ts: Timestamp) -> bool {
        let Some(count) = self.active.get_mut(&read_ts) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.active.remove(&read_ts);
        }
        true
    }

    /// Oldest snapshot still in use.
    pub fn min(&self) -> Option<Timestamp> {
        self.active.keys().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
