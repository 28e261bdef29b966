//! Error types for pool admission.

use thiserror::Error;

use crate::ticket::TicketId;

/// Result type for pool gate operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by [`PoolGate::run`](crate::PoolGate::run).
///
/// Exactly one of these (or the operation's own result) reaches the
/// caller; nothing is swallowed. Each variant carries enough context to
/// diagnose contention on a specific pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The configured timeout elapsed before admission completed or before
    /// the guarded operation finished. Cleanup has already run by the time
    /// this is observable.
    #[error("pool {pool}: timed out after {elapsed_ms}ms (ticket {ticket})")]
    Timeout {
        /// Pool the caller was queued against.
        pool: String,
        /// The caller's ticket id.
        ticket: TicketId,
        /// Wall-clock time from enqueue to the deadline firing.
        elapsed_ms: u64,
    },

    /// Admission polling exceeded the retry budget without the retry
    /// target ever being satisfied. Driven by poll count, not wall clock,
    /// so it can fire earlier or later than [`PoolError::Timeout`].
    #[error("pool {pool}: maximum retries exceeded after {retries} polls (ticket {ticket})")]
    RetryBudgetExhausted {
        /// Pool the caller was queued against.
        pool: String,
        /// The caller's ticket id.
        ticket: TicketId,
        /// Number of polls performed before giving up.
        retries: u32,
    },

    /// The caller's own ticket was missing from a queue snapshot it had
    /// just inserted it into. Indicates a broken store adapter (lost
    /// write, wrong partition, or a read that is not strongly consistent).
    #[error("pool {pool}: own ticket {ticket} missing from queue snapshot")]
    TicketVanished {
        /// Pool the caller was queued against.
        pool: String,
        /// The caller's ticket id.
        ticket: TicketId,
    },

    /// A failure from the backing store, propagated unmodified.
    #[error("ticket store failure: {0}")]
    Store(anyhow::Error),

    /// The caller's cleanup closure failed on the normal completion path.
    /// Timeout-path cleanup failures are logged instead, to avoid masking
    /// the timeout signal.
    #[error("cleanup failed: {0}")]
    Cleanup(anyhow::Error),

    /// The pool configuration was rejected at gate construction.
    #[error("invalid pool config: {0}")]
    InvalidConfig(String),
}
