use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MvccResult};

pub const DEFAULT_MAX_BATCH_COUNT: usize = 100_000;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 64 << 20;
pub const DEFAULT_CONFLICT_MAP_SOFT_LIMIT: usize = 1 << 16;
pub const MAX_KEY_SIZE: usize = 65000;

/// Options fixed when the oracle is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Transaction read and commit timestamps are supplied by the caller.
    /// Only useful for systems that own a global timestamp order themselves.
    pub managed_txns: bool,

    /// Check committing transactions for conflicts. Transactions can be processed at a
    /// higher rate when this is disabled.
    pub detect_conflicts: bool,

    /// Maximum number of entries in one transaction batch.
    pub max_batch_count: usize,

    /// Maximum size in bytes of one transaction batch.
    pub max_batch_size: usize,

    /// Number of conflict-map entries above which old entries are evicted even while
    /// transactions are running (0 disables partial eviction).
    pub conflict_map_soft_limit: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            managed_txns: false,
            detect_conflicts: true,
            max_batch_count: DEFAULT_MAX_BATCH_COUNT,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            conflict_map_soft_limit: DEFAULT_CONFLICT_MAP_SOFT_LIMIT,
        }
    }
}

impl OracleConfig {
    pub fn managed() -> Self {
        Self::default().managed_txns(true)
    }

    pub fn from_json(json: &str) -> MvccResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn managed_txns(mut self, managed_txns: bool) -> Self {
        self.managed_txns = managed_txns;
        self
    }

    pub fn detect_conflicts(mut self, detect_conflicts: bool) -> Self {
        self.detect_conflicts = detect_conflicts;
        self
    }

    pub fn max_batch_count(mut self, max_batch_count: usize) -> Self {
        self.max_batch_count = max_batch_count;
        self
    }

    pub fn max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn conflict_map_soft_limit(mut self, limit: usize) -> Self {
        self.conflict_map_soft_limit = limit;
        self
    }

    pub fn validate(&self) -> MvccResult<()> {
        if self.max_batch_count == 0 {
            return Err(ConfigError::InvalidOption {
                name: "max_batch_count",
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        if self.max_batch_size <= MAX_KEY_SIZE {
            return Err(ConfigError::InvalidOption {
                name: "max_batch_size",
                reason: format!("must be larger than the maximum key size {MAX_KEY_SIZE}"),
            }
            .into());
        }
        Ok(())
    }
}
