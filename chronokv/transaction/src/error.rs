use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp overflow, reached {0}")]
    Overflow(u64),

    #[error("timestamp 0 is reserved and cannot be used as a {0} timestamp")]
    Reserved(&'static str),
}
