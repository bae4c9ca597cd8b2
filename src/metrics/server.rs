use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use prometheus::{Encoder, TextEncoder};

use super::Metrics;

/// Shared handle mounted into each service's HTTP app.
#[derive(Clone)]
pub struct MetricsHandle {
    pub metrics: Arc<Metrics>,
    pub service: &'static str,
}

/// Mounts `/metrics` and `/health` on the service's main server.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

async fn metrics_handler(handle: web::Data<MetricsHandle>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = handle.metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(handle: web::Data<MetricsHandle>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": handle.service,
    }))
}
