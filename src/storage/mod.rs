pub mod accounts;
pub mod orders;

use sqlx::{PgPool, Postgres, Transaction};

use crate::errors::AppError;

// ============================================================================
// Unit of Work
// ============================================================================
//
// Every logical operation runs inside one transaction obtained here. The
// handle rolls back when dropped uncommitted, so any early return or panic
// unwinds to a rollback; `commit` is the single happy exit. Workers that
// must share their transaction with a domain handler pass the handle down
// explicitly instead of stashing it in ambient state.
//
// ============================================================================

#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

impl Storage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        Ok(self.pool.begin().await?)
    }
}
