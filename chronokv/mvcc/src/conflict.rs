//! Conflict tracking between concurrent transactions.

use chronokv_transaction::{Fingerprint, Timestamp};
use hashbrown::HashMap;

/// Latest commit timestamp for every key fingerprint written by a committed transaction.
///
/// A committing transaction conflicts if any key it read was committed by someone else
/// after its snapshot, i.e. at a timestamp strictly greater than its read timestamp.
/// An entry at or below the smallest read timestamp any live or future transaction can hold
/// can never produce a conflict again, which is what bounds the map.
#[derive(Debug, Default)]
pub struct ConflictTracker {
    commits: HashMap<Fingerprint, Timestamp>,
}

impl ConflictTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first read fingerprint committed after `read_ts`, with its commit timestamp.
    pub fn find_conflict(
        &self,
        reads: &[Fingerprint],
        read_ts: Timestamp,
    ) -> Option<(Fingerprint, Timestamp)> {
        reads.iter().find_map(|fp| {
            self.commits
                .get(fp)
                .filter(|commit_ts| **commit_ts > read_ts)
                .map(|commit_ts| (*fp, *commit_ts))
        })
    }

    /// Record the writes of a transaction committed at `commit_ts`.
    /// Entries only move forward, so an out-of-order managed commit never hides a later one.
    pub fn record(&mut self, writes: &[Fingerprint], commit_ts: Timestamp) {
        for fp in writes {
            self.commits
                .entry(*fp)
                .and_modify(|ts| *ts = (*ts).max(commit_ts))
                .or_insert(commit_ts);
        }
    }

    /// Drop every entry committed at or below `ts`. Returns the number of evicted entries.
    pub fn evict_at_or_below(&mut self, ts: Timestamp) -> usize {
        let before = self.commits.len();
        self.commits.retain(|_, commit_ts| *commit_ts > ts);
        before - self.commits.len()
    }

    pub fn get(&self, fp: Fingerprint) -> Option<Timestamp> {
        self.commits.get(&fp).copied()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}
