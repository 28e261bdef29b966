use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, trace, warn};

use crate::admission::{evaluate, Admission};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::store::TicketStore;
use crate::ticket::Ticket;

/// Entry point for running operations under a pool's concurrency budget.
///
/// Each call to [`PoolGate::run`] enqueues one ticket in the shared table,
/// polls the queue until admitted, runs the guarded operation, and retires
/// the ticket. Callers coordinate only through the store; a gate instance
/// holds no cross-call state and can be shared freely behind an [`Arc`].
pub struct PoolGate<S> {
    store: Arc<S>,
    config: PoolConfig,
}

impl<S> std::fmt::Debug for PoolGate<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolGate")
            .field("store_type", &std::any::type_name::<S>())
            .field("config", &self.config)
            .finish()
    }
}

impl<S: TicketStore> PoolGate<S> {
    /// Create a gate over a ticket store, validating the configuration.
    pub fn new(store: Arc<S>, config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Get the gate configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Run `operation` once a pool slot is available, then release it.
    ///
    /// `cleanup` releases whatever resources the operation may have
    /// partially acquired and runs exactly once on every path: after the
    /// operation on success, and before the failure is observable on the
    /// timeout and give-up paths.
    ///
    /// The whole sequence races a `timeout_ms` deadline. Whichever side
    /// finishes first determines the outcome; the loser is cancelled at
    /// its next suspension point and its result discarded. The operation
    /// can therefore begin just as the deadline fires and still be torn
    /// down: a best-effort boundary, not a linearizable guarantee.
    pub async fn run<T, Op, OpFut, Cl, ClFut>(&self, operation: Op, cleanup: Cl) -> PoolResult<T>
    where
        T: Send,
        Op: FnOnce() -> OpFut + Send,
        OpFut: Future<Output = T> + Send,
        Cl: FnOnce() -> ClFut + Send,
        ClFut: Future<Output = anyhow::Result<()>> + Send,
    {
        let config = &self.config;
        if config.bypass {
            let result = operation().await;
            cleanup().await.map_err(PoolError::Cleanup)?;
            return Ok(result);
        }

        let ticket = Ticket::new(
            &config.pool_name,
            chrono::Duration::milliseconds(config.timeout_ms as i64),
        );
        self.store
            .put(&config.table, &ticket)
            .await
            .map_err(PoolError::Store)?;
        debug!(pool = %ticket.pool, ticket = %ticket.id, "enqueued pool ticket");

        let deadline = tokio::time::sleep(std::time::Duration::from_millis(config.timeout_ms));
        let guarded = async {
            self.wait_until_admitted(&ticket).await?;
            debug!(pool = %ticket.pool, ticket = %ticket.id, "admitted");
            Ok(operation().await)
        };
        tokio::pin!(guarded);

        let outcome: PoolResult<T> = tokio::select! {
            result = &mut guarded => result,
            _ = deadline => {
                let elapsed_ms =
                    (Utc::now() - ticket.created_at).num_milliseconds().max(0) as u64;
                Err(PoolError::Timeout {
                    pool: ticket.pool.clone(),
                    ticket: ticket.id,
                    elapsed_ms,
                })
            }
        };

        match outcome {
            Ok(result) => {
                cleanup().await.map_err(PoolError::Cleanup)?;
                self.store
                    .delete(&config.table, &ticket.pool, ticket.id)
                    .await
                    .map_err(PoolError::Store)?;
                debug!(pool = %ticket.pool, ticket = %ticket.id, "retired pool ticket");
                Ok(result)
            }
            Err(err) => {
                // Release eagerly; an unretired ticket would hold its
                // slot until logical expiry. Secondary failures are
                // logged so the primary error still propagates.
                if let Err(cleanup_err) = cleanup().await {
                    warn!(
                        pool = %ticket.pool,
                        ticket = %ticket.id,
                        "cleanup failed while aborting: {cleanup_err}"
                    );
                }
                if let Err(delete_err) = self
                    .store
                    .delete(&config.table, &ticket.pool, ticket.id)
                    .await
                {
                    warn!(
                        pool = %ticket.pool,
                        ticket = %ticket.id,
                        "ticket delete failed while aborting: {delete_err}"
                    );
                }
                Err(err)
            }
        }
    }

    /// Poll the queue until admitted or the retry budget runs out.
    ///
    /// Each round takes a fresh strongly consistent snapshot and asks the
    /// evaluator for a verdict. A retry target in the past counts as
    /// admission: enough tickets ahead have already expired. Otherwise the
    /// sleep is capped at the retry target but floored at a jittered
    /// minimum, so contenders neither oversleep an opening slot nor
    /// hammer the store in lockstep.
    async fn wait_until_admitted(&self, ticket: &Ticket) -> PoolResult<()> {
        let config = &self.config;
        let mut retries: u32 = 0;
        loop {
            let snapshot = self
                .store
                .query(&config.table, &ticket.pool, config.query_limit)
                .await
                .map_err(PoolError::Store)?;
            let target = match evaluate(&snapshot, ticket, config.pool_size)? {
                Admission::Admit => return Ok(()),
                Admission::RetryAt(at) => at,
            };

            let now = Utc::now();
            if target <= now {
                return Ok(());
            }
            retries += 1;
            if retries > config.max_retries {
                return Err(PoolError::RetryBudgetExhausted {
                    pool: ticket.pool.clone(),
                    ticket: ticket.id,
                    retries,
                });
            }

            let until_target = (target - now).num_milliseconds().max(0) as u64;
            let floor = config.min_wait_queue_ms
                + rand::thread_rng().gen_range(0..=config.wait_variance_ms);
            let sleep_ms = until_target.min(floor);
            trace!(
                pool = %ticket.pool,
                ticket = %ticket.id,
                retries,
                sleep_ms,
                "pool full, backing off"
            );
            tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;
        }
    }
}
