use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a pool ticket.
///
/// Built from a UUID v7, so ids sort lexically in creation order and double
/// as the per-ticket sort key in the backing store. Ties between ids minted
/// in the same millisecond break on the random tail, which keeps the total
/// order well defined across workers.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct TicketId(pub Uuid);

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketId {
    /// Create a new ticket ID using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One admission attempt against a pool, stored as a single row in the
/// ticket table under the pool's partition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    /// Name of the pool this ticket queues for (partition key).
    pub pool: String,
    /// Time-sortable identifier; defines FIFO queue position (sort key).
    pub id: TicketId,
    /// Instant the ticket was created; also the fixed reference instant
    /// for this requester's liveness checks.
    pub created_at: DateTime<Utc>,
    /// Deadline after which the ticket no longer counts toward queue
    /// position. Set to `created_at + timeout`.
    pub logical_expiry: DateTime<Utc>,
    /// Coarse deadline the store may use to garbage-collect the row.
    /// Never consulted by admission logic.
    pub storage_expiry: DateTime<Utc>,
}

impl Ticket {
    /// Mint a fresh ticket for `pool` with a logical lifetime of `timeout`.
    ///
    /// The storage expiry is set a full hour out so the store can
    /// garbage-collect abandoned rows long after they stop mattering for
    /// admission.
    pub fn new(pool: impl Into<String>, timeout: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            pool: pool.into(),
            id: TicketId::new(),
            created_at,
            logical_expiry: created_at + timeout,
            storage_expiry: created_at + Duration::hours(1),
        }
    }

    /// Whether this ticket still counts toward queue position as of `as_of`.
    ///
    /// Callers always pass their own `created_at` here, not wall-clock now:
    /// a requester's view of which competing tickets are live is frozen at
    /// its own enqueue instant, so a slowly draining queue can never extend
    /// a requester's perception of its own deadline. The flip side is that
    /// a ticket which visibly expires after a late joiner enqueued keeps
    /// occupying a slot in that joiner's view even once truly stale. That
    /// staleness is inherited behavior and deliberately kept.
    pub fn is_live(&self, as_of: DateTime<Utc>) -> bool {
        self.logical_expiry >= as_of
    }
}
