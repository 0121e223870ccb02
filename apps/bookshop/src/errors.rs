// apps/bookshop/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use uuid::Uuid;

use crate::db::StoreError;
use crate::models::OrderStatus;
use crate::web::envelope::ApiResponse;
use bookshop_flow::FlowError;

/// How a failure is reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  NotFound,
  Conflict,
}

/// Business-rule failures of the order workflows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
  #[error("The cart is empty.")]
  EmptyCart,

  #[error("Quantity for book {book_id} must be at least 1 (got {quantity}).")]
  InvalidQuantity { book_id: Uuid, quantity: i64 },

  #[error("Insufficient stock for book {book_id}: requested {requested}, available {available}.")]
  InsufficientStock {
    book_id: Uuid,
    requested: i64,
    available: i64,
  },

  #[error("The order total exceeds the largest supported amount.")]
  AmountTooLarge,

  #[error("Book {0} was not found.")]
  BookNotFound(Uuid),

  #[error("Order {0} was not found.")]
  OrderNotFound(Uuid),

  #[error("Invalid claim code.")]
  ClaimCodeNotFound,

  #[error("Order {order_id} was already {status}.")]
  AlreadyProcessed { order_id: Uuid, status: OrderStatus },

  #[error("Order {order_id} cannot move from {from} to {to}.")]
  InvalidTransition {
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
  },
}

impl OrderError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      OrderError::EmptyCart
      | OrderError::InvalidQuantity { .. }
      | OrderError::InsufficientStock { .. }
      | OrderError::AmountTooLarge => ErrorKind::Validation,
      OrderError::BookNotFound(_) | OrderError::OrderNotFound(_) | OrderError::ClaimCodeNotFound => ErrorKind::NotFound,
      OrderError::AlreadyProcessed { .. } | OrderError::InvalidTransition { .. } => ErrorKind::Conflict,
    }
  }

  /// Stable machine-readable code sent as `errorCode`.
  pub fn code(&self) -> &'static str {
    match self {
      OrderError::EmptyCart => "EMPTY_CART",
      OrderError::InvalidQuantity { .. } => "INVALID_QUANTITY",
      OrderError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
      OrderError::AmountTooLarge => "AMOUNT_TOO_LARGE",
      OrderError::BookNotFound(_) => "BOOK_NOT_FOUND",
      OrderError::OrderNotFound(_) => "ORDER_NOT_FOUND",
      OrderError::ClaimCodeNotFound => "CLAIM_CODE_NOT_FOUND",
      OrderError::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
      OrderError::InvalidTransition { .. } => "INVALID_TRANSITION",
    }
  }
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Order(#[from] OrderError),

  #[error("Storage Error: {0}")]
  Store(StoreError),

  #[error("Configuration Error: {0}")]
  Config(String),

  /// Delivery failures. Logged by the dispatcher and never returned from an order operation.
  #[error("Notification Error: {0}")]
  Notification(String),

  #[error("Workflow Error: {source}")]
  Workflow { source: FlowError },

  #[error("Internal Server Error: {0}")]
  Internal(String),

  #[error("Pipeline execution was halted by a handler.")]
  PipelineHaltedByHandler,
}

impl From<StoreError> for AppError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::InsufficientStock {
        book_id,
        requested,
        available,
      } => AppError::Order(OrderError::InsufficientStock {
        book_id,
        requested,
        available,
      }),
      StoreError::BookNotFound(book_id) => AppError::Order(OrderError::BookNotFound(book_id)),
      other => AppError::Store(other),
    }
  }
}

impl From<sqlx::Error> for AppError {
  fn from(err: sqlx::Error) -> Self {
    AppError::Store(StoreError::Database(err))
  }
}

impl From<FlowError> for AppError {
  fn from(err: FlowError) -> Self {
    match err {
      // A handler that failed through anyhow may still be carrying one of ours.
      FlowError::HandlerError { source } => match source.downcast::<AppError>() {
        Ok(app_err) => app_err,
        Err(other) => AppError::Internal(other.to_string()),
      },
      other => AppError::Workflow { source: other },
    }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    let err = match err.downcast::<AppError>() {
      Ok(app_err) => return app_err,
      Err(e) => e,
    };
    let err = match err.downcast::<OrderError>() {
      Ok(order_err) => return AppError::Order(order_err),
      Err(e) => e,
    };
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::from(sqlx_err),
      Err(e) => AppError::Internal(e.to_string()),
    }
  }
}

impl AppError {
  pub fn error_code(&self) -> &'static str {
    match self {
      AppError::Validation(_) => "VALIDATION_ERROR",
      AppError::Auth(_) => "UNAUTHORIZED",
      AppError::Forbidden(_) => "FORBIDDEN",
      AppError::NotFound(_) => "NOT_FOUND",
      AppError::Order(e) => e.code(),
      AppError::Store(StoreError::Unavailable(_)) => "STORAGE_UNAVAILABLE",
      AppError::Store(_) => "STORAGE_ERROR",
      AppError::Config(_) => "CONFIGURATION_ERROR",
      AppError::Notification(_) => "NOTIFICATION_ERROR",
      AppError::Workflow { .. } => "WORKFLOW_ERROR",
      AppError::Internal(_) => "INTERNAL_ERROR",
      AppError::PipelineHaltedByHandler => "PIPELINE_HALTED",
    }
  }

  /// Message safe to show a client. Server-side failures are not described.
  fn public_message(&self) -> String {
    match self {
      AppError::Validation(m) | AppError::Auth(m) | AppError::Forbidden(m) | AppError::NotFound(m) => m.clone(),
      AppError::Order(e) => e.to_string(),
      AppError::PipelineHaltedByHandler => "Process halted by business logic.".to_string(),
      AppError::Store(StoreError::Unavailable(_)) => "The service is temporarily unavailable.".to_string(),
      _ => "An internal error occurred.".to_string(),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Order(e) => match e.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
      },
      AppError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
      AppError::PipelineHaltedByHandler => StatusCode::CONFLICT,
      AppError::Store(_)
      | AppError::Config(_)
      | AppError::Notification(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::info!(application_error = %self, status = status.as_u16(), "Request rejected");
    }
    HttpResponse::build(status).json(ApiResponse::<()>::failure(self.public_message(), self.error_code()))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::body::to_bytes;

  #[test]
  fn order_errors_map_to_their_taxonomy() {
    let id = Uuid::new_v4();
    let cases = [
      (AppError::from(OrderError::EmptyCart), StatusCode::BAD_REQUEST, "EMPTY_CART"),
      (AppError::from(OrderError::AmountTooLarge), StatusCode::BAD_REQUEST, "AMOUNT_TOO_LARGE"),
      (
        AppError::from(OrderError::InsufficientStock {
          book_id: id,
          requested: 3,
          available: 1,
        }),
        StatusCode::BAD_REQUEST,
        "INSUFFICIENT_STOCK",
      ),
      (AppError::from(OrderError::ClaimCodeNotFound), StatusCode::NOT_FOUND, "CLAIM_CODE_NOT_FOUND"),
      (
        AppError::from(OrderError::AlreadyProcessed {
          order_id: id,
          status: OrderStatus::Completed,
        }),
        StatusCode::CONFLICT,
        "ALREADY_PROCESSED",
      ),
      (
        AppError::from(OrderError::InvalidTransition {
          order_id: id,
          from: OrderStatus::Completed,
          to: OrderStatus::Cancelled,
        }),
        StatusCode::CONFLICT,
        "INVALID_TRANSITION",
      ),
      (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
      (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    ];
    for (err, status, code) in cases {
      assert_eq!(err.status_code(), status, "{}", err);
      assert_eq!(err.error_code(), code);
    }
  }

  #[test]
  fn store_stock_errors_become_order_errors() {
    let id = Uuid::new_v4();
    let err = AppError::from(StoreError::BookNotFound(id));
    assert!(matches!(err, AppError::Order(OrderError::BookNotFound(b)) if b == id));
    let err = AppError::from(StoreError::ClaimCodeTaken);
    assert!(matches!(err, AppError::Store(StoreError::ClaimCodeTaken)));
  }

  #[test]
  fn app_error_survives_a_round_trip_through_flow_error() {
    let flow_err = FlowError::HandlerError {
      source: anyhow::Error::new(AppError::Order(OrderError::ClaimCodeNotFound)),
    };
    assert!(matches!(
      AppError::from(flow_err),
      AppError::Order(OrderError::ClaimCodeNotFound)
    ));

    let missing = FlowError::HandlerMissing {
      step_name: "persist_order".into(),
    };
    assert!(matches!(AppError::from(missing), AppError::Workflow { .. }));
  }

  #[actix_web::test]
  async fn error_response_uses_the_envelope_and_hides_internals() {
    let resp = AppError::Internal("connection string leaked".into()).error_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(resp.into_body()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["isSuccess"], false);
    assert_eq!(json["data"], serde_json::Value::Null);
    assert_eq!(json["errorCode"], "INTERNAL_ERROR");
    assert!(!json["message"].as_str().unwrap().contains("leaked"));
  }
}
