use thiserror::Error;

/// Hard failure conditions surfaced to the host embedding the core.
///
/// Soft conditions (busy ports, RAW hazards, resource conflicts, stalls) are
/// not represented here: they are absorbed by the producer and retried on
/// the next cycle, per the propagation policy the core follows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("connection '{0}' started without its control port bound")]
    Unbound(String),

    #[error("event scheduled at {requested} is before current time {now}")]
    PastEvent { now: u64, requested: u64 },

    #[error("address {0:#x} is not aligned to the requested access size")]
    Unaligned(u64),

    #[error("address {0:#x} is out of range for this memory device")]
    OutOfRange(u64),

    #[error("failed to load program image: {0}")]
    LoadFailure(String),
}

pub type ScoreResult<T> = Result<T, ScoreError>;
