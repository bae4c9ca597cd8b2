use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::messaging::inbox::InboxHandler;
use crate::messaging::outbox;
use crate::models::{Account, OrderMessage, OrderServedMessage, OrderStatus};
use crate::storage::{accounts, Storage};

// ============================================================================
// Payment Service
// ============================================================================
//
// Account CRUD runs in its own transactions; settlement runs inside the
// inbox worker's transaction so the debit, the result event and the inbox
// deletion land together. Insufficient funds and missing accounts are saga
// outcomes (a cancelled order), not pipeline errors.
//
// ============================================================================

#[derive(Clone)]
pub struct PaymentService {
    storage: Storage,
}

/// What settling an order does to the account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Finish { new_balance: i64 },
    Cancel,
}

/// Pure settlement decision: debit only when an account exists and the
/// balance stays non-negative.
pub fn settle(balance: Option<i64>, amount: i64) -> Settlement {
    match balance {
        Some(b) if b - amount >= 0 => Settlement::Finish {
            new_balance: b - amount,
        },
        _ => Settlement::Cancel,
    }
}

/// Signed replenishment: the delta may be negative, the result may not.
fn apply_delta(balance: i64, delta: i64) -> Result<i64, AppError> {
    let new_balance = balance
        .checked_add(delta)
        .ok_or_else(|| AppError::validation("amount out of range"))?;

    if new_balance < 0 {
        return Err(AppError::validation("not enough money on the account"));
    }

    Ok(new_balance)
}

impl PaymentService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub async fn get_account(&self, user_id: Uuid) -> Result<Account, AppError> {
        let mut tx = self.storage.begin().await?;
        let account = accounts::get(&mut tx, user_id).await?;
        tx.commit().await?;

        Ok(account)
    }

    /// One account per user.
    pub async fn create_account(&self, user_id: Uuid) -> Result<Account, AppError> {
        let mut tx = self.storage.begin().await?;

        match accounts::get(&mut tx, user_id).await {
            Ok(_) => return Err(AppError::validation("such user already has account")),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let account = Account { user_id, amount: 0 };
        accounts::insert(&mut tx, &account).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, "account created");
        Ok(account)
    }

    pub async fn replenish_account(&self, user_id: Uuid, amount: i64) -> Result<Account, AppError> {
        let mut tx = self.storage.begin().await?;

        let mut account = accounts::get(&mut tx, user_id).await?;
        account.amount = apply_delta(account.amount, amount)?;

        accounts::update_amount(&mut tx, user_id, account.amount).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, balance = account.amount, "account replenished");
        Ok(account)
    }

    /// Settles one order inside the caller's transaction. The settlement
    /// record makes redelivery harmless: a second run with the same order id
    /// returns success without touching the balance.
    pub async fn serve_order_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        msg: &OrderMessage,
    ) -> Result<(), AppError> {
        if !accounts::try_record_settlement(tx, msg.id).await? {
            tracing::debug!(order_id = %msg.id, "order already settled, skipping");
            return Ok(());
        }

        let balance = match accounts::get(tx, msg.user_id).await {
            Ok(account) => Some(account.amount),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let status = match settle(balance, msg.amount) {
            Settlement::Finish { new_balance } => {
                accounts::update_amount(tx, msg.user_id, new_balance).await?;
                OrderStatus::Finished
            }
            Settlement::Cancel => OrderStatus::Cancelled,
        };

        outbox::enqueue(
            tx,
            &OrderServedMessage {
                id: msg.id,
                status,
            },
        )
        .await?;

        tracing::info!(order_id = %msg.id, status = %status, "order served");
        Ok(())
    }
}

/// Inbox-side dispatch: deserializes each payload and settles it inside the
/// worker's transaction, failing the whole batch on the first error.
pub struct PaymentInboxHandler {
    service: PaymentService,
}

impl PaymentInboxHandler {
    pub fn new(service: PaymentService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl InboxHandler for PaymentInboxHandler {
    async fn handle(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        messages: &[serde_json::Value],
    ) -> Result<(), AppError> {
        for message in messages {
            let msg: OrderMessage = serde_json::from_value(message.clone())?;
            self.service.serve_order_in_tx(tx, &msg).await?;
        }

        Ok(())
    }
}
