// tests/context_management_tests.rs
mod common;

use bookshop_flow::{ContextData, FlowError, Pipeline, PipelineControl};
use common::*;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn later_steps_see_earlier_writes() {
  setup_tracing();
  let mut pipeline = Pipeline::<LedgerContext, LedgerError>::new(&[("set", false, None), ("adjust", false, None)]);

  pipeline.on_root("set", |ctx: ContextData<LedgerContext>| {
    Box::pin(async move {
      ctx.write().total_cents = 1000;
      Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
    })
  });
  pipeline.on_root("adjust", |ctx: ContextData<LedgerContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      assert_eq!(guard.total_cents, 1000);
      guard.total_cents -= 50;
      Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
    })
  });

  let ctx = ContextData::new(LedgerContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().total_cents, 950);
}

#[tokio::test]
#[serial]
async fn clones_share_one_value() {
  setup_tracing();
  let original = ContextData::new(LedgerContext::default());
  let clone = original.clone();

  original.write().total_cents = 5;
  assert_eq!(clone.read().total_cents, 5);

  clone.write().notes.push_str("seen");
  assert_eq!(original.snapshot().notes, "seen");
  assert_eq!(*original.map_read(|c| &c.total_cents), 5);
}

#[tokio::test]
#[serial]
async fn guards_released_before_await() {
  setup_tracing();
  let ctx = ContextData::new(LedgerContext::default());

  let start = { ctx.read().total_cents };
  tokio::time::sleep(std::time::Duration::from_millis(1)).await;
  {
    ctx.write().total_cents = start + 1;
  }

  assert!(ctx.try_write().is_some());
  {
    let _reader = ctx.read();
    assert!(ctx.try_write().is_none());
    assert!(ctx.try_read().is_some());
  }
  assert_eq!(ctx.read().total_cents, 1);
}
