pub mod order_api;
pub mod payment_api;

use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// Deserializes a request body, mapping failures to a validation error so
/// the response keeps the `{"error": ...}` shape.
pub fn unmarshal_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::validation(format!("invalid body: {e}")))
}
