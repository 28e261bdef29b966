//! Dpool - distributed bounded-concurrency admission gate.
//!
//! A cross-process pool limiter coordinated through a shared, strongly
//! consistent ordered key-value table instead of in-process memory. Any
//! number of workers, on any number of machines, contend for a named pool;
//! at most `pool_size` of them run their guarded operation at once, and
//! the rest queue FIFO by ticket creation order, bounded by a per-request
//! timeout.
//!
//! # Core Concepts
//!
//! - **Ticket**: one row per admission attempt, time-sortable by id. See
//!   [`Ticket`] and [`TicketId`].
//!
//! - **Store**: the [`TicketStore`] trait abstracts the backing table;
//!   the gate only needs `put`, idempotent `delete`, and a strongly
//!   consistent descending `query` over a pool's partition.
//!
//! - **Admission**: [`admission::evaluate`] turns a queue snapshot into
//!   an admit-now verdict or the earliest instant a re-check can succeed.
//!
//! - **Gate**: [`PoolGate::run`] ties it together: enqueue, poll with
//!   jittered backoff, race the whole flow against the timeout, execute,
//!   retire.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dpool::{PoolConfig, PoolGate};
//!
//! let config = PoolConfig {
//!     pool_name: "render".to_string(),
//!     pool_size: 4,
//!     ..PoolConfig::new("pool-tickets")
//! };
//! let gate = PoolGate::new(Arc::new(store), config)?;
//!
//! let frame = gate
//!     .run(|| async { render_frame().await }, || async { Ok(()) })
//!     .await?;
//! ```
//!
//! # Consistency notes
//!
//! Admission is FIFO among live tickets subject to the store's read
//! consistency; the gate requires linearizable reads of the pool
//! partition, and a weaker read model can transiently over-admit. A
//! requester judges competing tickets live relative to its *own* enqueue
//! instant, never wall-clock now, so a long-waiting caller can keep
//! counting a ticket that has since expired. Both caveats are documented
//! behavior, not bugs to fix here.

/// Queue position evaluation.
///
/// The `admission` module decides, from a snapshot of live tickets,
/// whether a caller may proceed or when re-checking could next succeed:
/// - [`admission::evaluate`] - the sliding-window FIFO computation
/// - [`Admission`] - admit-now or retry-at verdict
pub mod admission;

/// Gate configuration.
///
/// The `config` module defines [`PoolConfig`] with documented defaults
/// and construction-time validation.
pub mod config;

/// Error taxonomy for pool admission.
///
/// The `error` module defines [`PoolError`] (timeout, retry budget,
/// store and cleanup failures) and the [`PoolResult`] alias.
pub mod error;

/// The pool gate itself.
///
/// The `gate` module provides [`PoolGate`], the public entry point that
/// enqueues a ticket, waits for admission, and runs the guarded
/// operation under the timeout race.
pub mod gate;

/// Ticket store collaborator seam.
///
/// The `store` module defines the [`TicketStore`] trait implemented by
/// backing-table adapters.
pub mod store;

/// Ticket data model.
///
/// The `ticket` module defines [`Ticket`] and the time-sortable
/// [`TicketId`].
pub mod ticket;

pub use admission::*;
pub use config::*;
pub use error::*;
pub use gate::*;
pub use store::*;
pub use ticket::*;
