use async_trait::async_trait;

use crate::ticket::{Ticket, TicketId};

/// Trait for the ordered key-value table that backs a pool's queue.
///
/// Implementors wrap an external store (DynamoDB-style table, SQL table
/// with a composite key, or the in-memory testkit store) that the gate
/// does not own or provision. Rows are partitioned by pool name and
/// sorted by ticket id within a partition.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Insert or overwrite one ticket row.
    async fn put(&self, table: &str, ticket: &Ticket) -> anyhow::Result<()>;

    /// Remove a ticket row. Deleting an absent key must succeed; the gate
    /// relies on this when the deadline path and the completion path race
    /// to retire the same ticket.
    async fn delete(&self, table: &str, pool: &str, id: TicketId) -> anyhow::Result<()>;

    /// Fetch up to `limit` tickets for a pool partition, descending by
    /// ticket id, with a strongly consistent read.
    ///
    /// Strong consistency is required: a stale snapshot can transiently
    /// admit more than `pool_size` callers. The `limit` cap is a soft
    /// limit inherited from the store's query API; if a queue can outgrow
    /// it the evaluator's position computation becomes approximate (see
    /// the `query_limit` notes on [`PoolConfig`](crate::PoolConfig)).
    async fn query(&self, table: &str, pool: &str, limit: u32) -> anyhow::Result<Vec<Ticket>>;
}
