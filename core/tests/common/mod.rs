// tests/common/mod.rs
#![allow(dead_code)]

use bookshop_flow::{ContextData, FlowError, Handler, PipelineControl};
use once_cell::sync::Lazy;
use tracing::Level;

/// Running tally a test pipeline mutates step by step.
#[derive(Clone, Debug, Default)]
pub struct LedgerContext {
  pub total_cents: i64,
  pub notes: String,
  pub steps_executed: Vec<String>,
  pub stop_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
  /// Engine failure, kept as its Debug text so assertions can compare.
  #[error("flow error: {0}")]
  Flow(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for LedgerError {
  fn from(fe: FlowError) -> Self {
    LedgerError::Flow(format!("{:?}", fe))
  }
}

/// Handler that adds `cents` to the tally and records `label`; stops when `stop_at` names it.
pub fn add_cents(label: &'static str, cents: i64) -> Handler<LedgerContext, LedgerError> {
  Box::new(move |ctx: ContextData<LedgerContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.total_cents += cents;
      guard.notes.push_str(label);
      guard.notes.push(';');
      guard.steps_executed.push(label.to_string());
      tracing::debug!(target: "ledger_handlers", step = label, total = guard.total_cents, "applied");
      if guard.stop_at.as_deref() == Some(label) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn fail_with(label: &'static str, message: &'static str) -> Handler<LedgerContext, LedgerError> {
  Box::new(move |ctx: ContextData<LedgerContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(label.to_string());
      Err(LedgerError::Handler(message.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
