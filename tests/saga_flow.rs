//! Infrastructure-backed tests for the outbox/inbox substrate and the saga.
//!
//! These need a reachable Postgres. Point `TEST_DATABASE_URL` at an empty
//! database and run with `cargo test -- --ignored`. The tests share one
//! database and serialize themselves on a global lock.

use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use order_saga::config::WorkerConfig;
use order_saga::db;
use order_saga::errors::AppError;
use order_saga::messaging::inbox::{InboxHandler, InboxWorker};
use order_saga::messaging::listener::{InboxWriter, MessageHandler};
use order_saga::messaging::outbox::{self, OutboxWorker};
use order_saga::messaging::publisher::EventPublisher;
use order_saga::metrics::Metrics;
use order_saga::models::{Account, OrderMessage, OrderServedMessage, OrderStatus};
use order_saga::services::order::OrderService;
use order_saga::services::payment::{PaymentInboxHandler, PaymentService};
use order_saga::storage::{accounts, Storage};

fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

async fn setup() -> (PgPool, MutexGuard<'static, ()>) {
    let guard = test_lock().lock().await;

    let url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must point at a test database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("failed to connect to test database");

    db::apply_migrations(&pool, db::ORDER_MIGRATIONS).await.unwrap();
    db::apply_migrations(&pool, db::PAYMENT_MIGRATIONS).await.unwrap();

    sqlx::query("TRUNCATE orders, accounts, settlements, outbox, inbox")
        .execute(&pool)
        .await
        .unwrap();

    (pool, guard)
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        period: Duration::from_millis(50),
        batch_size: 10,
    }
}

fn metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new().unwrap())
}

/// Records published events instead of talking to a broker.
#[derive(Clone, Default)]
struct RecordingPublisher {
    events: Arc<StdMutex<Vec<serde_json::Value>>>,
}

impl RecordingPublisher {
    fn recorded(&self) -> Vec<serde_json::Value> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, events: &[serde_json::Value]) -> Result<(), AppError> {
        self.events.lock().unwrap().extend_from_slice(events);
        Ok(())
    }
}

struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _events: &[serde_json::Value]) -> Result<(), AppError> {
        Err(AppError::Internal(anyhow::anyhow!("broker unavailable")))
    }
}

struct FailingHandler;

#[async_trait]
impl InboxHandler for FailingHandler {
    async fn handle(
        &self,
        _tx: &mut Transaction<'_, Postgres>,
        _messages: &[serde_json::Value],
    ) -> Result<(), AppError> {
        Err(AppError::Internal(anyhow::anyhow!("handler exploded")))
    }
}

async fn outbox_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM outbox")
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn inbox_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM inbox")
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn seed_account(pool: &PgPool, balance: i64) -> Uuid {
    let user_id = Uuid::new_v4();
    let mut tx = pool.begin().await.unwrap();
    accounts::insert(
        &mut tx,
        &Account {
            user_id,
            amount: balance,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    user_id
}

async fn balance_of(pool: &PgPool, user_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT amount FROM accounts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ============================================================================
// Atomicity
// ============================================================================

#[tokio::test]
#[ignore = "requires postgres"]
async fn create_order_commits_order_and_outbox_together() {
    let (pool, _guard) = setup().await;
    let service = OrderService::new(Storage::new(pool.clone()));

    let user_id = Uuid::new_v4();
    let order = service
        .create_order(user_id, 100, "coffee".to_string())
        .await
        .unwrap();

    let order_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE id = $1")
        .bind(order.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(order_count, 1);

    let message: serde_json::Value = sqlx::query_scalar("SELECT message FROM outbox")
        .fetch_one(&pool)
        .await
        .unwrap();
    let published: OrderMessage = serde_json::from_value(message).unwrap();
    assert_eq!(published.id, order.id);
    assert_eq!(published.user_id, user_id);
    assert_eq!(published.amount, 100);
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn abandoned_transaction_leaves_neither_order_nor_outbox_row() {
    let (pool, _guard) = setup().await;
    let storage = Storage::new(pool.clone());

    {
        let mut tx = storage.begin().await.unwrap();
        let order = order_saga::models::Order {
            id: Uuid::now_v7(),
            user_id: Uuid::new_v4(),
            description: "doomed".to_string(),
            amount: 10,
            status: OrderStatus::New,
        };
        order_saga::storage::orders::insert(&mut tx, &order).await.unwrap();
        outbox::enqueue(
            &mut tx,
            &OrderMessage {
                id: order.id,
                user_id: order.user_id,
                amount: order.amount,
            },
        )
        .await
        .unwrap();
        // dropped uncommitted: the failure path of the unit of work
    }

    let order_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(order_count, 0);
    assert_eq!(outbox_count(&pool).await, 0);
}

// ============================================================================
// Outbox worker: never-lost, at-least-once
// ============================================================================

#[tokio::test]
#[ignore = "requires postgres"]
async fn outbox_rows_survive_a_failed_publish() {
    let (pool, _guard) = setup().await;

    let mut tx = pool.begin().await.unwrap();
    outbox::enqueue(&mut tx, &serde_json::json!({"k": 1})).await.unwrap();
    outbox::enqueue(&mut tx, &serde_json::json!({"k": 2})).await.unwrap();
    tx.commit().await.unwrap();

    let worker = OutboxWorker::new(pool.clone(), FailingPublisher, worker_config(), metrics());
    assert!(worker.run_once().await.is_err());

    assert_eq!(outbox_count(&pool).await, 2);
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn outbox_batch_is_published_then_deleted() {
    let (pool, _guard) = setup().await;

    let mut tx = pool.begin().await.unwrap();
    for k in 0..3 {
        outbox::enqueue(&mut tx, &serde_json::json!({"k": k})).await.unwrap();
    }
    tx.commit().await.unwrap();

    let publisher = RecordingPublisher::default();
    let worker = OutboxWorker::new(pool.clone(), publisher.clone(), worker_config(), metrics());
    assert_eq!(worker.run_once().await.unwrap(), 3);

    assert_eq!(outbox_count(&pool).await, 0);

    // Selection order is unspecified: assert on the set, not the sequence.
    let mut keys: Vec<i64> = publisher
        .recorded()
        .iter()
        .map(|e| e["k"].as_i64().unwrap())
        .collect();
    keys.sort();
    assert_eq!(keys, vec![0, 1, 2]);
}

// ============================================================================
// Inbox worker: all-or-nothing batches
// ============================================================================

#[tokio::test]
#[ignore = "requires postgres"]
async fn failed_inbox_batch_rolls_back_completely() {
    let (pool, _guard) = setup().await;

    let writer = InboxWriter::new(pool.clone());
    writer.handle(br#"{"n": 1}"#).await.unwrap();
    writer.handle(br#"{"n": 2}"#).await.unwrap();

    let worker = InboxWorker::new(pool.clone(), FailingHandler, worker_config(), metrics());
    assert!(worker.run_once().await.is_err());

    assert_eq!(inbox_count(&pool).await, 2);
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn inbox_batch_applies_and_deletes_on_success() {
    let (pool, _guard) = setup().await;
    let payment = PaymentService::new(Storage::new(pool.clone()));

    let user_id = seed_account(&pool, 150).await;
    let order_id = Uuid::now_v7();

    let msg = OrderMessage {
        id: order_id,
        user_id,
        amount: 100,
    };
    InboxWriter::new(pool.clone())
        .handle(serde_json::to_vec(&msg).unwrap().as_slice())
        .await
        .unwrap();

    let worker = InboxWorker::new(
        pool.clone(),
        PaymentInboxHandler::new(payment),
        worker_config(),
        metrics(),
    );
    assert_eq!(worker.run_once().await.unwrap(), 1);

    assert_eq!(inbox_count(&pool).await, 0);
    assert_eq!(balance_of(&pool, user_id).await, 50);

    let served: serde_json::Value = sqlx::query_scalar("SELECT message FROM outbox")
        .fetch_one(&pool)
        .await
        .unwrap();
    let served: OrderServedMessage = serde_json::from_value(served).unwrap();
    assert_eq!(served.id, order_id);
    assert_eq!(served.status, OrderStatus::Finished);
}

// ============================================================================
// Settlement idempotency and saga outcomes
// ============================================================================

#[tokio::test]
#[ignore = "requires postgres"]
async fn serving_the_same_order_twice_debits_once() {
    let (pool, _guard) = setup().await;
    let payment = PaymentService::new(Storage::new(pool.clone()));

    let user_id = seed_account(&pool, 300).await;
    let msg = OrderMessage {
        id: Uuid::now_v7(),
        user_id,
        amount: 100,
    };

    for _ in 0..2 {
        let mut tx = pool.begin().await.unwrap();
        payment.serve_order_in_tx(&mut tx, &msg).await.unwrap();
        tx.commit().await.unwrap();
    }

    assert_eq!(balance_of(&pool, user_id).await, 200);
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn insufficient_funds_cancel_without_debiting() {
    let (pool, _guard) = setup().await;
    let payment = PaymentService::new(Storage::new(pool.clone()));

    let user_id = seed_account(&pool, 50).await;
    let msg = OrderMessage {
        id: Uuid::now_v7(),
        user_id,
        amount: 100,
    };

    let mut tx = pool.begin().await.unwrap();
    payment.serve_order_in_tx(&mut tx, &msg).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(balance_of(&pool, user_id).await, 50);

    let served: serde_json::Value = sqlx::query_scalar("SELECT message FROM outbox")
        .fetch_one(&pool)
        .await
        .unwrap();
    let served: OrderServedMessage = serde_json::from_value(served).unwrap();
    assert_eq!(served.status, OrderStatus::Cancelled);
}

// ============================================================================
// Saga end to end (brokerless: events are carried by hand between services)
// ============================================================================

async fn run_saga(pool: &PgPool, balance: i64, amount: i64) -> (OrderStatus, i64) {
    let orders_svc = OrderService::new(Storage::new(pool.clone()));
    let payment_svc = PaymentService::new(Storage::new(pool.clone()));

    let user_id = seed_account(pool, balance).await;
    let order = orders_svc
        .create_order(user_id, amount, "saga".to_string())
        .await
        .unwrap();

    // Order's outbox worker publishes the OrderMessage.
    let publisher = RecordingPublisher::default();
    let worker = OutboxWorker::new(pool.clone(), publisher.clone(), worker_config(), metrics());
    worker.run_once().await.unwrap();

    // Payment's listener lands it in the inbox, the inbox worker settles it.
    for event in publisher.recorded() {
        InboxWriter::new(pool.clone())
            .handle(serde_json::to_vec(&event).unwrap().as_slice())
            .await
            .unwrap();
    }
    let inbox_worker = InboxWorker::new(
        pool.clone(),
        PaymentInboxHandler::new(payment_svc),
        worker_config(),
        metrics(),
    );
    inbox_worker.run_once().await.unwrap();

    // Payment's outbox worker publishes the OrderServedMessage, which the
    // order service applies directly.
    let result_publisher = RecordingPublisher::default();
    let result_worker =
        OutboxWorker::new(pool.clone(), result_publisher.clone(), worker_config(), metrics());
    result_worker.run_once().await.unwrap();

    for event in result_publisher.recorded() {
        let served: OrderServedMessage = serde_json::from_value(event).unwrap();
        orders_svc
            .set_order_status(served.id, served.status)
            .await
            .unwrap();
    }

    let final_order = orders_svc.get_order(order.id).await.unwrap();
    (final_order.status, balance_of(pool, user_id).await)
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn saga_finishes_order_and_debits_when_funded() {
    let (pool, _guard) = setup().await;
    let (status, balance) = run_saga(&pool, 150, 100).await;

    assert_eq!(status, OrderStatus::Finished);
    assert_eq!(balance, 50);
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn saga_cancels_order_and_keeps_balance_when_underfunded() {
    let (pool, _guard) = setup().await;
    let (status, balance) = run_saga(&pool, 50, 100).await;

    assert_eq!(status, OrderStatus::Cancelled);
    assert_eq!(balance, 50);
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn duplicate_completion_message_does_not_flip_terminal_status() {
    let (pool, _guard) = setup().await;
    let (status, _balance) = run_saga(&pool, 150, 100).await;
    assert_eq!(status, OrderStatus::Finished);

    let orders_svc = OrderService::new(Storage::new(pool.clone()));
    let order = orders_svc.list_orders().await.unwrap().remove(0);

    // Redelivered stale message is swallowed by the transition guard.
    orders_svc
        .set_order_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let after = orders_svc.get_order(order.id).await.unwrap();
    assert_eq!(after.status, OrderStatus::Finished);
}
