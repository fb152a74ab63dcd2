//! Query execution engine.
//!
//! One logical `query()` call runs as a linear sequence of awaited steps:
//! translate, bind, acquire the pool, execute against a request timeout,
//! classify the outcome, normalize. Connection-class failures are retried
//! through the pool manager inside an explicit bounded loop with linear
//! backoff; every other error propagates on first occurrence.

use crate::db::driver::DriverResponse;
use crate::db::normalize::normalize;
use crate::db::pool::PoolManager;
use crate::error::{DbError, DbResult};
use crate::models::{QueryResult, RetryPolicy, StatementKind, Value};
use crate::sql::{BoundStatement, bind, translate};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Orchestrates translate -> bind -> acquire -> execute -> normalize with
/// bounded retries.
pub struct QueryExecutor {
    pool: Arc<PoolManager>,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl QueryExecutor {
    /// Create a new executor over a pool manager.
    pub fn new(pool: Arc<PoolManager>, retry: RetryPolicy, request_timeout: Duration) -> Self {
        Self {
            pool,
            retry,
            request_timeout,
        }
    }

    /// Execute one logical statement and return the normalized result.
    ///
    /// Retryable failures (connection-class errors and request timeouts) mark
    /// the pool Degraded and are retried up to the policy limit; the backoff
    /// before retry n is `base_delay * (n + 1)`. After exhaustion the final
    /// underlying error reaches the caller annotated with the attempt count.
    pub async fn query(&self, sql: &str, params: &[Value]) -> DbResult<QueryResult> {
        let kind = StatementKind::of(sql);
        let translated = translate(sql);
        let bound = bind(&translated, params)?;

        debug!(
            sql = %bound.text,
            params = bound.params.len(),
            kind = ?kind,
            "executing statement"
        );

        let mut attempt: u32 = 0;
        loop {
            match self.attempt(&bound).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!(attempts = attempt + 1, "statement succeeded after retry");
                    }
                    return Ok(normalize(kind, response));
                }
                Err(error) => {
                    if error.is_retryable() {
                        self.pool.mark_degraded().await;
                        if attempt < self.retry.max_retries {
                            let delay = self.retry.delay_for(attempt);
                            warn!(
                                error = %error,
                                attempt = attempt + 1,
                                delay_ms = delay.as_millis() as u64,
                                "retryable failure, backing off"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                    }
                    return Err(error.with_attempts(attempt + 1));
                }
            }
        }
    }

    /// Issue the trivial liveness statement through the full pipeline.
    pub async fn probe(&self) -> DbResult<()> {
        self.query("SELECT 1", &[]).await.map(|_| ())
    }

    /// One execution attempt: acquire the pool and race the statement against
    /// the request timeout. The layer cannot abort a server-side execution
    /// that outlives the race; a timed-out write may still land.
    async fn attempt(&self, bound: &BoundStatement) -> DbResult<DriverResponse> {
        let handle = self.pool.get_pool().await?;
        match tokio::time::timeout(self.request_timeout, handle.execute(bound)).await {
            Ok(result) => result,
            Err(_) => Err(DbError::timeout("statement execution", self.request_timeout)),
        }
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
