pub mod inbox;
pub mod listener;
pub mod outbox;
pub mod publisher;

/// Queue carrying `OrderMessage` from the order service to payment.
pub const TOPIC_ORDER_TO_PAYMENT: &str = "order_to_payment";

/// Queue carrying `OrderServedMessage` from payment back to the order service.
pub const TOPIC_PAYMENT_TO_ORDER: &str = "payment_to_order";
