//! Key fingerprints used for conflict tracking without storing full keys.

use std::hash::BuildHasher;
use std::sync::LazyLock;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

// Fixed seeds keep fingerprints stable across oracle instances in one process.
static FINGERPRINT_HASHER: LazyLock<RandomState> = LazyLock::new(|| {
    RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
});

/// A fixed-size hash of a key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Fingerprint a key.
    pub fn of(key: &[u8]) -> Self {
        Self(BuildHasher::hash_one(&*FINGERPRINT_HASHER, key))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}
