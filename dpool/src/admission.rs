//! Queue admission evaluation.
//!
//! Given a snapshot of all live tickets in a pool partition, decides
//! whether a caller's ticket may proceed now or computes the earliest
//! instant at which re-checking could possibly succeed. The snapshot is
//! read-only; the evaluator performs no I/O and holds no state, which
//! keeps the sliding-window semantics directly testable.

use chrono::{DateTime, Utc};

use crate::error::{PoolError, PoolResult};
use crate::ticket::Ticket;

/// Outcome of evaluating a queue snapshot for one caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Admission {
    /// The caller is within the first `pool_size` queue positions and may
    /// proceed immediately.
    Admit,
    /// The caller must wait; re-checking before this instant cannot
    /// succeed, because not enough tickets ahead of it will have expired.
    RetryAt(DateTime<Utc>),
}

/// Evaluate a caller's queue position against a snapshot of its pool.
///
/// Liveness is judged relative to `own.created_at`, the caller's fixed
/// reference instant (see [`Ticket::is_live`]). Queue position is the
/// caller's index in the live tickets sorted ascending by id, i.e. by
/// creation order. Callers within the first `pool_size` positions are
/// admitted; everyone else gets the `(i - pool_size)`-th earliest logical
/// expiry among the `i` tickets ahead of it: at least that many of them
/// must expire before a slot can be free, so polling sooner is pointless.
///
/// The snapshot must contain the caller's own ticket; it was inserted by
/// the caller before the first evaluation, so absence means the store
/// adapter lost the write or the read was not strongly consistent.
pub fn evaluate(snapshot: &[Ticket], own: &Ticket, pool_size: usize) -> PoolResult<Admission> {
    let mut queue: Vec<&Ticket> = snapshot
        .iter()
        .filter(|t| t.is_live(own.created_at))
        .collect();
    queue.sort_by(|a, b| a.id.cmp(&b.id));

    let position = queue
        .iter()
        .position(|t| t.id == own.id)
        .ok_or_else(|| PoolError::TicketVanished {
            pool: own.pool.clone(),
            ticket: own.id,
        })?;

    if position < pool_size {
        return Ok(Admission::Admit);
    }

    let mut expiries_ahead: Vec<DateTime<Utc>> = queue[..position]
        .iter()
        .map(|t| t.logical_expiry)
        .collect();
    expiries_ahead.sort();

    Ok(Admission::RetryAt(expiries_ahead[position - pool_size]))
}
