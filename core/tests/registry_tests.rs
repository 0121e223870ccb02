// tests/registry_tests.rs
mod common;

use bookshop_flow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult, Registry};
use common::*;

#[derive(Clone, Debug, Default)]
struct RedeemCtx {
  code: String,
  redeemed: bool,
}

#[derive(Clone, Debug, Default)]
struct CancelCtx {
  cancelled: bool,
}

#[tokio::test]
async fn dispatches_by_context_type() {
  setup_tracing();
  let registry = Registry::<LedgerError>::new();

  let mut redeem = Pipeline::<RedeemCtx, LedgerError>::new(&[("redeem", false, None)]);
  redeem.on_root("redeem", |ctx: ContextData<RedeemCtx>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.redeemed = !guard.code.is_empty();
      Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
    })
  });
  registry.register_pipeline(redeem);

  let mut cancel = Pipeline::<CancelCtx, LedgerError>::new(&[("cancel", false, None)]);
  cancel.on_root("cancel", |ctx: ContextData<CancelCtx>| {
    Box::pin(async move {
      ctx.write().cancelled = true;
      Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
    })
  });
  registry.register_pipeline(cancel);

  assert!(registry.contains::<RedeemCtx>());
  assert_eq!(registry.step_names::<CancelCtx>(), Some(vec!["cancel".to_string()]));

  let redeem_ctx = ContextData::new(RedeemCtx {
    code: "ABCD2345XY".to_string(),
    ..Default::default()
  });
  assert_eq!(registry.run(redeem_ctx.clone()).await, Ok(PipelineResult::Completed));
  assert!(redeem_ctx.read().redeemed);

  let cancel_ctx = ContextData::new(CancelCtx::default());
  assert_eq!(registry.run(cancel_ctx.clone()).await, Ok(PipelineResult::Completed));
  assert!(cancel_ctx.read().cancelled);
}

#[tokio::test]
async fn unregistered_context_is_a_configuration_error() {
  setup_tracing();
  let registry = Registry::<LedgerError>::new();

  #[derive(Clone, Debug, Default)]
  struct OrphanCtx;

  match registry.run(ContextData::new(OrphanCtx)).await {
    Err(LedgerError::Flow(s)) => {
      assert!(s.contains("ConfigurationError"));
      assert!(s.contains("OrphanCtx"));
    }
    other => panic!("expected ConfigurationError, got {:?}", other),
  }
}

#[tokio::test]
async fn pipeline_errors_surface_through_the_registry() {
  setup_tracing();
  let registry = Registry::<LedgerError>::new();
  let mut p = Pipeline::<CancelCtx, LedgerError>::new(&[("cancel", false, None)]);
  p.on_root("cancel", |_ctx: ContextData<CancelCtx>| {
    Box::pin(async move { Err::<PipelineControl, _>(LedgerError::Handler("order already completed".to_string())) })
  });
  registry.register_pipeline(p);

  let result = registry.run(ContextData::new(CancelCtx::default())).await;
  assert_eq!(result, Err(LedgerError::Handler("order already completed".to_string())));
}

#[tokio::test]
async fn default_registry_uses_flow_error() {
  setup_tracing();
  let registry: Registry = Registry::default();
  assert!(!registry.contains::<RedeemCtx>());
  assert!(registry.run(ContextData::new(RedeemCtx::default())).await.is_err());
}
