use crate::types::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

/// Every failure a handler can report. The variant decides the HTTP status
/// and the `kind` string clients branch on.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database connection failed")]
    DatabaseConnection,

    #[error("Database operation failed: {0}")]
    DatabaseOperation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient stock for {variant}: requested {requested}, available {available}")]
    InsufficientStock {
        variant: String,
        requested: i32,
        available: i32,
    },

    #[error("Order is not paid")]
    OrderNotPaid,

    #[error("Order has already been reviewed")]
    AlreadyReviewed,

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    /// Raised by `Notifier` implementations. Messages are best effort, so this
    /// is only ever logged and never answers a request.
    #[error("Notification service error: {0}")]
    Notification(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Inventory inconsistency: {0}")]
    InternalInconsistency(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseConnection
            | AppError::DatabaseOperation(_)
            | AppError::InternalInconsistency(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,

            AppError::NotFound(_) => StatusCode::NOT_FOUND,

            AppError::ValidationFailed(_) | AppError::OrderNotPaid => StatusCode::BAD_REQUEST,

            AppError::Conflict(_)
            | AppError::AlreadyReviewed
            | AppError::InsufficientStock { .. } => StatusCode::CONFLICT,

            AppError::Unauthorized => StatusCode::UNAUTHORIZED,

            AppError::PaymentGateway(_) | AppError::Notification(_) | AppError::NetworkError(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::ValidationFailed(_) => "validation_failed",
            AppError::Conflict(_) | AppError::AlreadyReviewed => "conflict",
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::OrderNotPaid => "order_not_paid",
            AppError::PaymentGateway(_) | AppError::Notification(_) | AppError::NetworkError(_) => {
                "upstream_failure"
            }
            AppError::Unauthorized => "unauthorized",
            AppError::DatabaseConnection
            | AppError::DatabaseOperation(_)
            | AppError::InternalInconsistency(_)
            | AppError::InternalError(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let response_body = ApiResponse::<()>::error(self.kind(), self.to_string());

        (status_code, Json(response_body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        AppError::DatabaseOperation(err.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        tracing::error!("Failed to check out a database connection: {}", err);
        AppError::DatabaseConnection
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            AppError::NetworkError(err.to_string())
        } else {
            AppError::PaymentGateway(err.to_string())
        }
    }
}
