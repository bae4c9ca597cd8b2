use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Order, OrderStatus};

pub async fn get(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Order, AppError> {
    let row = sqlx::query("SELECT id, user_id, description, amount, status FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("order with id {id} not found")))?;

    from_row(&row)
}

pub async fn list(tx: &mut Transaction<'_, Postgres>) -> Result<Vec<Order>, AppError> {
    let rows = sqlx::query("SELECT id, user_id, description, amount, status FROM orders")
        .fetch_all(&mut **tx)
        .await?;

    rows.iter().map(from_row).collect()
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO orders (id, user_id, description, amount, status) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(&order.description)
    .bind(order.amount)
    .bind(order.status.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn update_status(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    status: OrderStatus,
) -> Result<(), AppError> {
    sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

fn from_row(row: &PgRow) -> Result<Order, AppError> {
    let status: String = row.try_get("status")?;

    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        description: row.try_get("description")?,
        amount: row.try_get("amount")?,
        status: status.parse()?,
    })
}
