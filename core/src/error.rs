// src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Failures raised by the engine itself rather than by a workflow's handlers.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Type mismatch during context dispatch (expected {expected_type}, at '{step_name}')")]
  TypeMismatch { step_name: String, expected_type: String },

  #[error("Error in handler or external operation. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },

  #[error("Configuration error for '{step_name}': {message}")]
  ConfigurationError { step_name: String, message: String },

  #[error("Internal flow error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for FlowError {
  fn from(err: AnyhowError) -> Self {
    // An anyhow error that already wraps a FlowError is unwrapped instead of nested.
    match err.downcast::<FlowError>() {
      Ok(flow_err) => flow_err,
      Err(other) => FlowError::HandlerError { source: other },
    }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
