use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};

/// Configuration for a pool admission gate.
///
/// Every knob has a default except `table`, which names the backing
/// ticket table and must be supplied at construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Name of the backing ticket table. Required, no default.
    pub table: String,
    /// Maximum time in milliseconds for admission plus the guarded
    /// operation. Also the logical lifetime of the ticket: if the ticket
    /// is never retired it stops counting against the pool after this.
    pub timeout_ms: u64,
    /// Logical pool the caller contends in (the table partition key).
    pub pool_name: String,
    /// Maximum number of tickets admitted at once.
    pub pool_size: usize,
    /// Skip coordination entirely and run the operation directly.
    pub bypass: bool,
    /// Floor for the jittered sleep between admission re-checks, in
    /// milliseconds.
    pub min_wait_queue_ms: u64,
    /// Upper bound on the random jitter added to each re-check sleep, in
    /// milliseconds. Spreads contenders out to avoid a thundering herd
    /// against the store.
    pub wait_variance_ms: u64,
    /// Maximum number of admission polls before giving up.
    pub max_retries: u32,
    /// Cap on the queue snapshot query. A queue longer than this is only
    /// partially visible and queue positions become approximate; size it
    /// comfortably above the worst contention you expect.
    pub query_limit: u32,
}

impl PoolConfig {
    /// Create a configuration for the given ticket table with all other
    /// fields at their defaults: 10s timeout, pool "pool1" of size 20,
    /// 100ms poll floor with 20ms jitter, 50 retries, query limit 1000.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            timeout_ms: 10_000,
            pool_name: "pool1".to_string(),
            pool_size: 20,
            bypass: false,
            min_wait_queue_ms: 100,
            wait_variance_ms: 20,
            max_retries: 50,
            query_limit: 1000,
        }
    }

    /// Validate the configuration, rejecting values the admission
    /// algorithm cannot operate with.
    pub fn validate(&self) -> PoolResult<()> {
        if self.table.is_empty() {
            return Err(PoolError::InvalidConfig(
                "table name must not be empty".to_string(),
            ));
        }
        if self.pool_name.is_empty() {
            return Err(PoolError::InvalidConfig(
                "pool name must not be empty".to_string(),
            ));
        }
        if self.pool_size < 1 {
            return Err(PoolError::InvalidConfig(format!(
                "pool_size must be >= 1, got {}",
                self.pool_size
            )));
        }
        if self.timeout_ms == 0 {
            return Err(PoolError::InvalidConfig(
                "timeout_ms must be > 0".to_string(),
            ));
        }
        if self.query_limit < 1 {
            return Err(PoolError::InvalidConfig(
                "query_limit must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
