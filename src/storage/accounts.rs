use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::Account;

pub async fn get(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<Account, AppError> {
    let row = sqlx::query("SELECT amount FROM accounts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("account with user_id {user_id} not found")))?;

    Ok(Account {
        user_id,
        amount: row.try_get("amount")?,
    })
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, account: &Account) -> Result<(), AppError> {
    sqlx::query("INSERT INTO accounts (user_id, amount) VALUES ($1, $2)")
        .bind(account.user_id)
        .bind(account.amount)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn update_amount(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: i64,
) -> Result<(), AppError> {
    sqlx::query("UPDATE accounts SET amount = $1 WHERE user_id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Records that an order has been settled. Returns false when a settlement
/// row already exists, which is how a redelivered order message is detected
/// before it can debit twice.
pub async fn try_record_settlement(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<bool, AppError> {
    let result = sqlx::query("INSERT INTO settlements (order_id) VALUES ($1) ON CONFLICT (order_id) DO NOTHING")
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected() == 1)
}
