//! The error type shared by every route handler.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde_json::json;

use crate::config::ConfigError;
use crate::services::email_service::EmailError;
use crate::services::image_service::ImageUploadError;
use crate::services::payment::interface::PaymentError;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] PaymentError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Upload error: {0}")]
    Upload(#[from] ImageUploadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    /// Turns a unique-index violation into a conflict, anything else stays a
    /// database error.
    pub fn from_insert(err: mongodb::error::Error, conflict_msg: &str) -> Self {
        if is_duplicate_key(&err) {
            AppError::Conflict(conflict_msg.to_string())
        } else {
            AppError::Database(err)
        }
    }
}

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upload(ImageUploadError::InvalidImageFormat(_)) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Gateway(_)
            | AppError::Email(_)
            | AppError::Upload(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("{}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(json!({ "error": message }))
    }
}
