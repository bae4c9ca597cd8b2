use actix_web::http::StatusCode;
use actix_web::HttpResponse;

// ============================================================================
// Application Error Taxonomy
// ============================================================================
//
// Validation and not-found errors carry a caller-facing message and map to
// 400/404. Everything else is opaque to callers: the detail is logged
// server-side and the response body stays generic.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Broker(#[from] rdkafka::error::KafkaError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Validation(message) | AppError::NotFound(message) => {
                HttpResponse::build(self.status_code())
                    .json(serde_json::json!({ "error": message }))
            }
            other => {
                tracing::error!(error = %other, "request failed");
                HttpResponse::InternalServerError()
                    .json(serde_json::json!({ "error": "Internal server error" }))
            }
        }
    }
}
