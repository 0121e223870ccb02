// apps/bookshop/src/pipelines/status_update_pipeline.rs

//! Staff status override, used when a claim code cannot be presented. Follows the same
//! transition table as every other path.

use crate::errors::{AppError, Result as AppResult};
use crate::models::OrderStatus;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::StatusUpdateCtxData;
use crate::services::order_lifecycle;
use bookshop_flow::{ContextData, Pipeline, PipelineControl, Registry};
use std::sync::Arc;
use tracing::{info, instrument};

type Ctx = ContextData<StatusUpdateCtxData>;

pub fn register_status_update_pipeline(registry: &Arc<Registry<AppError>>) {
  let mut p = Pipeline::<StatusUpdateCtxData, AppError>::new(&[
    ("load_order", false, None),
    ("check_transition", false, None),
    ("apply_transition", false, None),
  ]);

  p.on_root("load_order", load_order);
  p.on_root("check_transition", check_transition);
  p.on_root("apply_transition", apply_transition);

  registry.register_pipeline(p);
}

#[instrument(name = "status_update::load_order", skip(ctx), err)]
async fn load_order(ctx: Ctx) -> AppResult<PipelineControl> {
  let (store, order_id) = {
    let guard = ctx.read();
    (guard.app_state.store.clone(), guard.order_id)
  };
  let order = common_steps::load_order(store.as_ref(), order_id).await?;
  ctx.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "status_update::check_transition", skip(ctx), err)]
async fn check_transition(ctx: Ctx) -> AppResult<PipelineControl> {
  let guard = ctx.read();
  let current = guard
    .order
    .as_ref()
    .map(|o| o.status())
    .ok_or_else(|| AppError::Internal("order not loaded".to_string()))?;
  order_lifecycle::check_transition(guard.order_id, current, guard.target)?;
  info!(order_id = %guard.order_id, from = %current, to = %guard.target, "Status override accepted.");
  Ok(PipelineControl::Continue)
}

#[instrument(name = "status_update::apply_transition", skip(ctx), err)]
async fn apply_transition(ctx: Ctx) -> AppResult<PipelineControl> {
  let (store, order_id, target) = {
    let guard = ctx.read();
    (guard.app_state.store.clone(), guard.order_id, guard.target)
  };
  let updated = common_steps::commit_transition(
    store.as_ref(),
    order_id,
    OrderStatus::Pending,
    target,
    |current| order_lifecycle::stale_rejection(order_id, current, target),
  )
  .await?;
  ctx.write().order = Some(updated);
  Ok(PipelineControl::Continue)
}
