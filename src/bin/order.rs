use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use tokio_util::sync::CancellationToken;

use order_saga::config::ServiceConfig;
use order_saga::db;
use order_saga::messaging::listener::QueueListener;
use order_saga::messaging::outbox::OutboxWorker;
use order_saga::messaging::publisher::KafkaPublisher;
use order_saga::messaging::{TOPIC_ORDER_TO_PAYMENT, TOPIC_PAYMENT_TO_ORDER};
use order_saga::metrics::{self, Metrics, MetricsHandle};
use order_saga::rest::order_api;
use order_saga::services::order::{OrderService, OrderStatusUpdater};
use order_saga::storage::Storage;

#[tokio::main]
async fn main() -> Result<()> {
    order_saga::init_tracing();
    tracing::info!("starting order service");

    let cfg = ServiceConfig::from_env()?;

    let pool = db::connect(&cfg.pg_conn_string).await?;
    db::apply_migrations(&pool, db::ORDER_MIGRATIONS).await?;

    let metrics = Arc::new(Metrics::new()?);
    let service = OrderService::new(Storage::new(pool.clone()));

    let publisher = KafkaPublisher::new(&cfg.kafka_brokers, TOPIC_ORDER_TO_PAYMENT)?;
    let outbox_worker = OutboxWorker::new(pool, publisher, cfg.outbox.clone(), metrics.clone());

    let listener = QueueListener::new(
        &cfg.kafka_brokers,
        "order-service",
        TOPIC_PAYMENT_TO_ORDER,
        OrderStatusUpdater::new(service.clone()),
        metrics.clone(),
    )?;

    let cancel = CancellationToken::new();

    let worker_cancel = cancel.clone();
    tokio::spawn(async move {
        outbox_worker.run(worker_cancel).await;
    });

    let listener_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = listener.run(listener_cancel).await {
            tracing::error!(error = %e, "listening queue failed");
        }
    });

    let app_service = web::Data::new(service);
    let app_metrics = web::Data::new(MetricsHandle {
        metrics,
        service: "order",
    });

    tracing::info!(addr = %cfg.http_addr, "order service listening");
    HttpServer::new(move || {
        App::new()
            .app_data(app_service.clone())
            .app_data(app_metrics.clone())
            .configure(order_api::configure)
            .configure(metrics::routes)
    })
    .bind(cfg.http_addr.as_str())?
    .run()
    .await?;

    cancel.cancel();
    Ok(())
}
