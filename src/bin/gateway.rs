use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Result;

use order_saga::config::GatewayConfig;
use order_saga::gateway::{proxy, Location, Router};
use order_saga::metrics::{self, Metrics, MetricsHandle};

#[tokio::main]
async fn main() -> Result<()> {
    order_saga::init_tracing();
    tracing::info!("starting gateway");

    let cfg = GatewayConfig::from_env()?;

    let metrics = Arc::new(Metrics::new()?);
    let locations = vec![
        Location {
            prefix: "/order".to_string(),
            url: cfg.order_url.clone(),
        },
        Location {
            prefix: "/account".to_string(),
            url: cfg.payment_url.clone(),
        },
    ];

    let router = web::Data::new(Router::new(locations, metrics.clone()));
    let app_metrics = web::Data::new(MetricsHandle {
        metrics,
        service: "gateway",
    });

    tracing::info!(addr = %cfg.http_addr, "gateway listening");
    HttpServer::new(move || {
        App::new()
            .app_data(router.clone())
            .app_data(app_metrics.clone())
            .configure(metrics::routes)
            .default_service(web::route().to(proxy))
    })
    .bind(cfg.http_addr.as_str())?
    .run()
    .await?;

    Ok(())
}
