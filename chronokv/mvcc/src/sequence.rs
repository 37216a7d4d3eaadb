use parking_lot::Mutex;
use tracing::debug;

use crate::db::Db;
use crate::error::{MvccResult, TransactionError};
use crate::txn::Txn;

/// Monotonically increasing integers stored under a key.
///
/// Values are leased from the store `bandwidth` at a time, so most calls to
/// [`Sequence::next`] never touch the oracle. Values leased but not handed out are lost
/// on a crash unless [`Sequence::release`] was called.
pub struct Sequence {
    db: Db,
    key: Vec<u8>,
    bandwidth: u64,
    lease: Mutex<Lease>,
}

#[derive(Debug, Default)]
struct Lease {
    next: u64,
    leased: u64,
}

impl Sequence {
    pub(crate) fn open(db: Db, key: Vec<u8>, bandwidth: u64) -> MvccResult<Self> {
        let seq = Self {
            db,
            key,
            bandwidth,
            lease: Mutex::new(Lease::default()),
        };
        {
            let mut lease = seq.lease.lock();
            seq.update_lease(&mut lease)?;
        }
        Ok(seq)
    }

    /// Next integer of the sequence.
    pub fn next(&self) -> MvccResult<u64> {
        let mut lease = self.lease.lock();
        if lease.next >= lease.leased {
            self.update_lease(&mut lease)?;
        }
        let value = lease.next;
        lease.next += 1;
        Ok(value)
    }

    /// Give back the unused part of the lease, so a later sequence on the same key
    /// continues right after the last value handed out.
    pub fn release(&self) -> MvccResult<()> {
        let mut lease = self.lease.lock();
        let next = lease.next;
        self.db
            .update(|txn| txn.set(self.key.clone(), next.to_be_bytes().to_vec()))?;
        lease.leased = next;
        debug!(next, "sequence lease released");
        Ok(())
    }

    fn update_lease(&self, lease: &mut Lease) -> MvccResult<()> {
        let bandwidth = self.bandwidth;
        let key = &self.key;
        let next = self.db.update(|txn: &mut Txn| {
            let next = match txn.get(key)? {
                Some(item) => decode(item.value())?,
                None => 0,
            };
            let leased = next.checked_add(bandwidth).ok_or_else(|| {
                TransactionError::SequenceLease(format!("lease past {next} overflows"))
            })?;
            txn.set(key.clone(), leased.to_be_bytes().to_vec())?;
            Ok(next)
        })?;
        lease.next = next;
        lease.leased = next + bandwidth;
        debug!(next, leased = lease.leased, "sequence lease renewed");
        Ok(())
    }
}

fn decode(value: &[u8]) -> MvccResult<u64> {
    let bytes: [u8; 8] = value.try_into().map_err(|_| {
        TransactionError::SequenceLease(format!(
            "stored lease has {} bytes, expected 8",
            value.len()
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}
