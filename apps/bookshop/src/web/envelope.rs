// apps/bookshop/src/web/envelope.rs

//! The single response body shape: `{isSuccess, data, message, errorCode?}`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
  pub is_success: bool,
  pub data: Option<T>,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_code: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
  pub fn ok(data: T, message: impl Into<String>) -> Self {
    Self {
      is_success: true,
      data: Some(data),
      message: message.into(),
      error_code: None,
    }
  }
}

impl ApiResponse<()> {
  pub fn failure(message: impl Into<String>, error_code: impl Into<String>) -> Self {
    Self {
      is_success: false,
      data: None,
      message: message.into(),
      error_code: Some(error_code.into()),
    }
  }
}
