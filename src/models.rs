use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

// ============================================================================
// Domain Models
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Finished,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Finished => "finished",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses are never overwritten by later saga messages.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Finished | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderStatus::New),
            "finished" => Ok(OrderStatus::Finished),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(AppError::validation(format!("unknown order status: {other}"))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    /// Minor currency units.
    pub amount: i64,
    #[serde(rename = "order_status")]
    pub status: OrderStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Account {
    pub user_id: Uuid,
    pub amount: i64,
}

// ============================================================================
// Saga Messages
// ============================================================================
//
// Wire contract of the two broker queues. Both are JSON; both may be
// delivered more than once, so consumers neutralize duplicates.
//
// ============================================================================

/// Published by the order service on `order_to_payment`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
}

/// Published by the payment service on `payment_to_order`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderServedMessage {
    pub id: Uuid,
    pub status: OrderStatus,
}
