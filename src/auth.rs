use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use uuid::Uuid;

use crate::errors::AppError;

// ============================================================================
// Caller identity
// ============================================================================

pub const HEADER_USER_ID: &str = "X-User-ID";

/// Authenticated caller, taken from the `X-User-ID` header. Extraction fails
/// with a validation error (400) when the header is missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

pub fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|e| {
        AppError::validation(format!(
            "cannot parse user ID from {HEADER_USER_ID} header: {e}"
        ))
    })
}

fn extract(req: &HttpRequest) -> Result<UserId, AppError> {
    let value = req.headers().get(HEADER_USER_ID).ok_or_else(|| {
        AppError::validation(format!("{HEADER_USER_ID} header is not specified"))
    })?;

    let raw = value.to_str().map_err(|_| {
        AppError::validation(format!("{HEADER_USER_ID} header is not valid UTF-8"))
    })?;

    parse_user_id(raw).map(UserId)
}

impl FromRequest for UserId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req))
    }
}
