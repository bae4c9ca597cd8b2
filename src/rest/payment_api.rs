use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::UserId;
use crate::errors::AppError;
use crate::services::payment::PaymentService;

use super::unmarshal_body;

// ============================================================================
// Payment REST API
// ============================================================================
//
// Every endpoint acts on the caller's own account, identified by the
// X-User-ID header.
//
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReplenishRequest {
    amount: i64,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/account")
            .route("", web::get().to(get_account))
            .route("", web::put().to(create_account))
            .route("/amount", web::post().to(replenish_account)),
    );
}

async fn get_account(
    service: web::Data<PaymentService>,
    caller: UserId,
) -> Result<HttpResponse, AppError> {
    let account = service.get_account(caller.0).await?;
    Ok(HttpResponse::Ok().json(account))
}

async fn create_account(
    service: web::Data<PaymentService>,
    caller: UserId,
) -> Result<HttpResponse, AppError> {
    let account = service.create_account(caller.0).await?;
    Ok(HttpResponse::Ok().json(account))
}

async fn replenish_account(
    service: web::Data<PaymentService>,
    caller: UserId,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let request: ReplenishRequest = unmarshal_body(&body)?;

    let account = service.replenish_account(caller.0, request.amount).await?;
    Ok(HttpResponse::Ok().json(account))
}
