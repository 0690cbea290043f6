// Error handling module for the Voucher API
// Provides the shared JSON error envelope and the error type used by the
// campaign management endpoints

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::db::StoreError;

/// Error type for campaign management handlers
#[derive(Debug)]
pub enum ApiError {
    /// Request body failed field validation
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Request is well-formed but describes an invalid entity
    /// Maps to HTTP 400 Bad Request
    InvalidInput(String),

    /// Resource not found by ID
    /// Maps to HTTP 404 Not Found
    NotFound {
        resource: String,
        id: String,
    },

    /// Duplicate or dependent resource conflict
    /// Maps to HTTP 409 Conflict
    Conflict {
        message: String,
    },

    /// Store unavailable (pool exhausted, statement timeout)
    /// Maps to HTTP 503 Service Unavailable
    Unavailable(String),

    /// Database operation errors
    /// Maps to HTTP 500 Internal Server Error, details are not sent to clients
    StoreError(StoreError),

    /// Internal server errors
    /// Maps to HTTP 500 Internal Server Error, details are not sent to clients
    InternalError(String),
}

/// Consistent error response structure
///
/// Every error response in the API uses this envelope: a machine-readable
/// `error_code`, a human-readable `message`, optional `details` and an
/// RFC 3339 timestamp.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "CAPACITY_EXCEEDED")]
    pub error_code: String,

    #[schema(example = "Campaign 3 has no vouchers left")]
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<serde_json::Value>,

    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert ApiError to HTTP status code and ErrorResponse
    ///
    /// Client errors are logged at debug (expected) or warn (conflicts);
    /// store and internal errors are logged in full at error level and
    /// replaced by a generic message.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                        .with_details(serde_json::to_value(errors).unwrap_or(serde_json::json!({}))),
                )
            }
            ApiError::InvalidInput(message) => {
                debug!("Invalid input: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("VALIDATION_ERROR", message.clone()),
                )
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("NOT_FOUND", format!("{} with id {} not found", resource, id)),
                )
            }
            ApiError::Conflict { message } => {
                warn!("Conflict error: {}", message);
                (StatusCode::CONFLICT, ErrorResponse::new("CONFLICT", message.clone()))
            }
            ApiError::Unavailable(message) => {
                warn!("Store unavailable: {}", message);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("STORE_UNAVAILABLE", "The service is temporarily unavailable, retry later"),
                )
            }
            ApiError::StoreError(store_error) => {
                error!("Database error: {:?}", store_error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("DATABASE_ERROR", "A database error occurred"),
                )
            }
            ApiError::InternalError(internal_msg) => {
                error!("Internal error: {}", internal_msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_ERROR", "An internal server error occurred"),
                )
            }
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::StoreError(_) | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert store errors to ApiError
impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Timeout => ApiError::Unavailable("store operation timed out".to_string()),
            StoreError::CampaignHasVouchers(count) => ApiError::Conflict {
                message: format!("Campaign has {} issued vouchers and cannot be deleted", count),
            },
            StoreError::CapacityBelowIssued { issued, capacity } => ApiError::Conflict {
                message: format!(
                    "Capacity {} is below the {} vouchers already issued",
                    capacity, issued
                ),
            },
            other => ApiError::StoreError(other),
        }
    }
}

/// Convert validator errors to ApiError
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}
