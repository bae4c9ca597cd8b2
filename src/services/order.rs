use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::messaging::listener::MessageHandler;
use crate::messaging::outbox;
use crate::models::{Order, OrderMessage, OrderServedMessage, OrderStatus};
use crate::storage::{orders, Storage};

// ============================================================================
// Order Service
// ============================================================================

#[derive(Clone)]
pub struct OrderService {
    storage: Storage,
}

impl OrderService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, AppError> {
        let mut tx = self.storage.begin().await?;
        let order = orders::get(&mut tx, id).await?;
        tx.commit().await?;

        Ok(order)
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, AppError> {
        let mut tx = self.storage.begin().await?;
        let list = orders::list(&mut tx).await?;
        tx.commit().await?;

        Ok(list)
    }

    /// Creates the order and its outbound `OrderMessage` in one transaction:
    /// the order row and the outbox row commit together or not at all.
    pub async fn create_order(
        &self,
        user_id: Uuid,
        amount: i64,
        description: String,
    ) -> Result<Order, AppError> {
        if amount <= 0 {
            return Err(AppError::validation("order amount must be positive"));
        }

        let order = Order {
            id: Uuid::now_v7(),
            user_id,
            description,
            amount,
            status: OrderStatus::New,
        };

        let mut tx = self.storage.begin().await?;

        orders::insert(&mut tx, &order).await?;
        outbox::enqueue(
            &mut tx,
            &OrderMessage {
                id: order.id,
                user_id: order.user_id,
                amount: order.amount,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            amount = order.amount,
            "order created"
        );

        Ok(order)
    }

    /// Applies a saga completion message. Completion messages are delivered
    /// at least once, so only `new` orders are updated; a message for an
    /// already terminal order is a no-op.
    pub async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), AppError> {
        let mut tx = self.storage.begin().await?;

        let order = orders::get(&mut tx, id).await?;
        if !transition_allowed(order.status, status) {
            tracing::warn!(
                order_id = %id,
                current = %order.status,
                incoming = %status,
                "ignoring status message for settled order"
            );
            tx.commit().await?;
            return Ok(());
        }

        orders::update_status(&mut tx, id, status).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, status = %status, "order status updated");
        Ok(())
    }
}

/// Orders move from `new` to a terminal status exactly once.
fn transition_allowed(current: OrderStatus, incoming: OrderStatus) -> bool {
    current == OrderStatus::New && incoming.is_terminal()
}

/// Listener-side dispatch: the order service consumes its completion queue
/// directly, without an inbox table.
pub struct OrderStatusUpdater {
    service: OrderService,
}

impl OrderStatusUpdater {
    pub fn new(service: OrderService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for OrderStatusUpdater {
    async fn handle(&self, payload: &[u8]) -> Result<(), AppError> {
        let msg: OrderServedMessage = serde_json::from_slice(payload)?;
        self.service.set_order_status(msg.id, msg.status).await
    }
}
