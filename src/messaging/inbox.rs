use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::errors::AppError;
use crate::metrics::Metrics;

// ============================================================================
// Inbox Worker
// ============================================================================
//
// The mirror image of the outbox worker: the listener lands raw deliveries
// in the inbox table, and this worker applies them to business state. The
// handler runs inside the worker's transaction, so business effects and the
// inbox-row deletion commit together.
//
// ============================================================================

/// The capability the inbox worker needs from the domain side: apply a batch
/// of raw payloads inside the worker's transaction.
#[async_trait]
pub trait InboxHandler: Send + Sync {
    /// Must be safe to re-run for already-applied payloads: the whole batch
    /// is retried after any failure.
    async fn handle(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        messages: &[serde_json::Value],
    ) -> Result<(), AppError>;
}

pub struct InboxWorker<H> {
    pool: PgPool,
    handler: H,
    cfg: WorkerConfig,
    metrics: Arc<Metrics>,
}

impl<H: InboxHandler> InboxWorker<H> {
    pub fn new(pool: PgPool, handler: H, cfg: WorkerConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            handler,
            cfg,
            metrics,
        }
    }

    /// Runs batch cycles until cancelled. A failed cycle is logged and the
    /// same rows are retried on the next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.cfg.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("inbox worker stopped");
                    return;
                }
                _ = tick.tick() => {
                    match self.run_once().await {
                        Ok(0) => tracing::debug!(cnt = 0, "serving inbox"),
                        Ok(cnt) => {
                            self.metrics.inbox_processed.inc_by(cnt as u64);
                            tracing::info!(cnt, "serving inbox");
                        }
                        Err(e) => {
                            self.metrics.worker_cycle_failures.with_label_values(&["inbox"]).inc();
                            tracing::error!(error = %e, "serving inbox failed");
                        }
                    }
                }
            }
        }
    }

    /// One batch cycle: select up to `batch_size` rows, hand the payloads to
    /// the handler inside this transaction, delete exactly those rows on
    /// success, commit. Any failure rolls back the entire cycle: no partial
    /// application, no partial deletion.
    pub async fn run_once(&self) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query("SELECT id, message FROM inbox LIMIT $1")
            .bind(self.cfg.batch_size)
            .fetch_all(&mut *tx)
            .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        let mut ids = Vec::with_capacity(rows.len());
        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            ids.push(row.try_get::<i64, _>("id")?);
            messages.push(row.try_get::<serde_json::Value, _>("message")?);
        }

        self.handler.handle(&mut tx, &messages).await?;

        sqlx::query("DELETE FROM inbox WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ids.len())
    }
}
