use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document store error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Document encoding error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("Document decoding error: {0}")]
    BsonDecode(#[from] mongodb::bson::de::Error),

    #[error("Relational store error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream responded {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    // The document was written but its mirror was not; nothing is rolled back.
    #[error("Product {product_id} saved but mirroring failed: {message}")]
    PartialWrite { product_id: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Http(_) | AppError::Upstream { .. } | AppError::PartialWrite { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Responding with {}: {}", status, self);
        } else {
            log::warn!("Responding with {}: {}", status, self);
        }

        let body = match self {
            AppError::Validation(m) | AppError::NotFound(m) | AppError::Conflict(m) => {
                json!({ "error": m })
            }
            AppError::Unauthenticated(m) => json!({ "error": m, "redirect": "/login" }),
            AppError::PartialWrite { product_id, message } => json!({
                "error": "Product saved but mirroring failed",
                "productId": product_id,
                "detail": message,
            }),
            AppError::Upstream { message, .. } => {
                json!({ "error": "Upstream service error", "detail": message })
            }
            _ => json!({ "error": "Internal Server Error" }),
        };
        HttpResponse::build(status).json(body)
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
