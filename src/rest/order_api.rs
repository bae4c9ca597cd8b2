use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::UserId;
use crate::errors::AppError;
use crate::services::order::OrderService;

use super::unmarshal_body;

// ============================================================================
// Order REST API
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    user_id: Uuid,
    description: String,
    amount: i64,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/order")
            .route("/all", web::get().to(list_orders))
            .route("/{orderId}", web::get().to(get_order))
            .route("", web::post().to(create_order)),
    );
}

async fn get_order(
    service: web::Data<OrderService>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order_id = Uuid::parse_str(&path).map_err(|e| {
        AppError::validation(format!("orderId UUID path value must be specified: {e}"))
    })?;

    let order = service.get_order(order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn list_orders(service: web::Data<OrderService>) -> Result<HttpResponse, AppError> {
    let orders = service.list_orders().await?;
    Ok(HttpResponse::Ok().json(orders))
}

async fn create_order(
    service: web::Data<OrderService>,
    _caller: UserId,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let request: CreateOrderRequest = unmarshal_body(&body)?;

    let order = service
        .create_order(request.user_id, request.amount, request.description)
        .await?;

    Ok(HttpResponse::Ok().json(order))
}
