use std::sync::Arc;

use serde::Serialize;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::errors::AppError;
use crate::metrics::Metrics;

use super::publisher::EventPublisher;

// ============================================================================
// Transactional Outbox
// ============================================================================
//
// Business transactions append events here instead of talking to the broker;
// the worker relays them afterwards. The append shares the producing
// transaction, so the state change and its event become visible together or
// not at all.
//
// ============================================================================

/// Append an outbound event to the outbox within the caller's transaction.
pub async fn enqueue<T: Serialize>(
    tx: &mut Transaction<'_, Postgres>,
    message: &T,
) -> Result<(), AppError> {
    let payload = serde_json::to_value(message)?;

    sqlx::query("INSERT INTO outbox (message) VALUES ($1)")
        .bind(payload)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Periodically drains the outbox table into the broker. Rows are deleted in
/// the same transaction that saw the publish succeed, so a row can only
/// disappear once its event is on the wire. The converse does not hold: a
/// publish followed by a failed commit leaves the row pending and the event
/// is sent again next tick (at-least-once).
pub struct OutboxWorker<P> {
    pool: PgPool,
    publisher: P,
    cfg: WorkerConfig,
    metrics: Arc<Metrics>,
}

impl<P: EventPublisher> OutboxWorker<P> {
    pub fn new(pool: PgPool, publisher: P, cfg: WorkerConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            publisher,
            cfg,
            metrics,
        }
    }

    /// Runs batch cycles until cancelled. A failed cycle is logged and
    /// retried on the next tick; it never stops the worker.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.cfg.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("outbox worker stopped");
                    return;
                }
                _ = tick.tick() => {
                    match self.run_once().await {
                        Ok(0) => tracing::debug!(cnt = 0, "serving outbox"),
                        Ok(cnt) => {
                            self.metrics.outbox_published.inc_by(cnt as u64);
                            tracing::info!(cnt, "serving outbox");
                        }
                        Err(e) => {
                            self.metrics.worker_cycle_failures.with_label_values(&["outbox"]).inc();
                            tracing::error!(error = %e, "serving outbox failed");
                        }
                    }
                }
            }
        }
    }

    /// One batch cycle: select up to `batch_size` pending rows, publish them,
    /// delete exactly those rows, commit. Any failure rolls the whole cycle
    /// back and the rows stay pending.
    pub async fn run_once(&self) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        // No ORDER BY: selection order is unspecified and nothing downstream
        // may rely on cross-row ordering.
        let rows = sqlx::query("SELECT id, message FROM outbox LIMIT $1")
            .bind(self.cfg.batch_size)
            .fetch_all(&mut *tx)
            .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        let mut ids = Vec::with_capacity(rows.len());
        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            ids.push(row.try_get::<i64, _>("id")?);
            events.push(row.try_get::<serde_json::Value, _>("message")?);
        }

        self.publisher.publish(&events).await?;

        sqlx::query("DELETE FROM outbox WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ids.len())
    }
}
