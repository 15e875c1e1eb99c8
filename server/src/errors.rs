// canteen-server/src/errors.rs

use actix_web::{HttpResponse, ResponseError};
use orderflow::FlowError;
use serde_json::json;
use thiserror::Error;

/// Shown to students when their wallet cannot cover an order.
pub const INSUFFICIENT_FUNDS_MESSAGE: &str = "رصيدك غير كافٍ لإتمام هذا الطلب.";

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Insufficient wallet balance")]
  InsufficientFunds,

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Display id allocation failed: {0}")]
  IdAllocation(String),

  #[error("Payment Gateway Error: {0}")]
  Gateway(String),

  #[error("Identity Provider Error: {0}")]
  Identity(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Store Error: {0}")]
  Store(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Workflow Error: {0}")]
  Workflow(#[from] FlowError),

  #[error("Internal Server Error: {0}")]
  Internal(String),

  // A pipeline stopped where the caller needed it to complete.
  #[error("Pipeline execution was halted by a handler.")]
  PipelineHaltedByHandler,
}

impl AppError {
  /// Client-caused kinds carry a message meant for the user. Everything else
  /// is a server-side failure whose detail stays in the logs.
  pub fn is_client_error(&self) -> bool {
    matches!(
      self,
      AppError::Validation(_) | AppError::Auth(_) | AppError::InsufficientFunds | AppError::NotFound(_)
    )
  }
}

impl ResponseError for AppError {
  fn error_response(&self) -> HttpResponse {
    if self.is_client_error() {
      tracing::warn!(application_error = %self, "Responding with client error");
    } else {
      tracing::error!(application_error = %self, "Responding with server error");
    }
    match self {
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::Auth(m) => HttpResponse::Unauthorized().json(json!({"error": m})),
      AppError::InsufficientFunds => HttpResponse::BadRequest().json(json!({"error": INSUFFICIENT_FUNDS_MESSAGE})),
      AppError::NotFound(m) => HttpResponse::NotFound().json(json!({"error": m})),
      AppError::IdAllocation(_) | AppError::Store(_) | AppError::Sqlx(_) => {
        HttpResponse::InternalServerError().json(json!({"error": "Database operation failed"}))
      }
      AppError::Gateway(_) => HttpResponse::InternalServerError().json(json!({"error": "Payment provider error"})),
      AppError::Identity(_) => {
        HttpResponse::InternalServerError().json(json!({"error": "Authentication service error"}))
      }
      AppError::Workflow(source) => {
        tracing::error!(workflow_error = ?source, "Workflow error details");
        HttpResponse::InternalServerError().json(json!({"error": "Workflow processing error"}))
      }
      AppError::Config(_) | AppError::Internal(_) => {
        HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred"}))
      }
      AppError::PipelineHaltedByHandler => {
        HttpResponse::Conflict().json(json!({"error": "Process halted as expected by business logic."}))
      }
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
