use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dpool::{Ticket, TicketId, TicketStore};
use parking_lot::Mutex;

/// Counts of store calls made through an [`InMemoryTicketStore`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StoreStats {
    /// Number of `put` calls.
    pub puts: usize,
    /// Number of `delete` calls.
    pub deletes: usize,
    /// Number of `query` calls.
    pub queries: usize,
}

impl StoreStats {
    /// Total number of store calls of any kind.
    pub fn total(&self) -> usize {
        self.puts + self.deletes + self.queries
    }
}

/// In-memory ticket store for tests.
///
/// Rows live in a per-table, per-pool ordered map keyed by ticket id, so
/// queries come back descending exactly like the real table. Deletes are
/// idempotent. Handles are cheap clones sharing the same state, which
/// lets a test hold one handle for assertions while the gate drives
/// another from spawned tasks.
#[derive(Clone, Default)]
pub struct InMemoryTicketStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, HashMap<String, BTreeMap<TicketId, Ticket>>>,
    stats: StoreStats,
    poison: Option<String>,
}

impl InMemoryTicketStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the call counters.
    pub fn stats(&self) -> StoreStats {
        self.inner.lock().stats
    }

    /// Make the next store call of any kind fail once with `message`.
    pub fn poison(&self, message: impl Into<String>) {
        self.inner.lock().poison = Some(message.into());
    }

    /// All tickets currently stored for a pool, ascending by id.
    pub fn tickets(&self, table: &str, pool: &str) -> Vec<Ticket> {
        let inner = self.inner.lock();
        inner
            .tables
            .get(table)
            .and_then(|t| t.get(pool))
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn check_poison(inner: &mut Inner) -> anyhow::Result<()> {
    if let Some(message) = inner.poison.take() {
        anyhow::bail!(message);
    }
    Ok(())
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn put(&self, table: &str, ticket: &Ticket) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        inner.stats.puts += 1;
        check_poison(&mut inner)?;
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .entry(ticket.pool.clone())
            .or_default()
            .insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn delete(&self, table: &str, pool: &str, id: TicketId) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        inner.stats.deletes += 1;
        check_poison(&mut inner)?;
        // Absent keys are fine: retiring a ticket twice must not error.
        if let Some(rows) = inner.tables.get_mut(table).and_then(|t| t.get_mut(pool)) {
            rows.remove(&id);
        }
        Ok(())
    }

    async fn query(&self, table: &str, pool: &str, limit: u32) -> anyhow::Result<Vec<Ticket>> {
        let mut inner = self.inner.lock();
        inner.stats.queries += 1;
        check_poison(&mut inner)?;
        let rows = inner
            .tables
            .get(table)
            .and_then(|t| t.get(pool))
            .map(|rows| {
                rows.values()
                    .rev()
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }
}
