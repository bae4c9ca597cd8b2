use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use tokio_util::sync::CancellationToken;

use order_saga::config::ServiceConfig;
use order_saga::db;
use order_saga::messaging::inbox::InboxWorker;
use order_saga::messaging::listener::{InboxWriter, QueueListener};
use order_saga::messaging::outbox::OutboxWorker;
use order_saga::messaging::publisher::KafkaPublisher;
use order_saga::messaging::{TOPIC_ORDER_TO_PAYMENT, TOPIC_PAYMENT_TO_ORDER};
use order_saga::metrics::{self, Metrics, MetricsHandle};
use order_saga::rest::payment_api;
use order_saga::services::payment::{PaymentInboxHandler, PaymentService};
use order_saga::storage::Storage;

#[tokio::main]
async fn main() -> Result<()> {
    order_saga::init_tracing();
    tracing::info!("starting payment service");

    let cfg = ServiceConfig::from_env()?;

    let pool = db::connect(&cfg.pg_conn_string).await?;
    db::apply_migrations(&pool, db::PAYMENT_MIGRATIONS).await?;

    let metrics = Arc::new(Metrics::new()?);
    let service = PaymentService::new(Storage::new(pool.clone()));

    let publisher = KafkaPublisher::new(&cfg.kafka_brokers, TOPIC_PAYMENT_TO_ORDER)?;
    let outbox_worker =
        OutboxWorker::new(pool.clone(), publisher, cfg.outbox.clone(), metrics.clone());

    let listener = QueueListener::new(
        &cfg.kafka_brokers,
        "payment-service",
        TOPIC_ORDER_TO_PAYMENT,
        InboxWriter::new(pool.clone()),
        metrics.clone(),
    )?;

    let inbox_worker = InboxWorker::new(
        pool,
        PaymentInboxHandler::new(service.clone()),
        cfg.inbox.clone(),
        metrics.clone(),
    );

    let cancel = CancellationToken::new();

    let outbox_cancel = cancel.clone();
    tokio::spawn(async move {
        outbox_worker.run(outbox_cancel).await;
    });

    let inbox_cancel = cancel.clone();
    tokio::spawn(async move {
        inbox_worker.run(inbox_cancel).await;
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
        service: "payment",
    });

    tracing::info!(addr = %cfg.http_addr, "payment service listening");
    HttpServer::new(move || {
        App::new()
            .app_data(app_service.clone())
            .app_data(app_metrics.clone())
            .configure(payment_api::configure)
            .configure(metrics::routes)
    })
    .bind(cfg.http_addr.as_str())?
    .run()
    .await?;

    cancel.cancel();
    Ok(())
}
