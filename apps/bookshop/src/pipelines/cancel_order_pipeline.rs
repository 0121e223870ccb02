// apps/bookshop/src/pipelines/cancel_order_pipeline.rs

//! Cancellation of a pending order by its owner or by staff. Stock comes back in the
//! same write as the status change.

use crate::errors::{AppError, Result as AppResult};
use crate::models::OrderStatus;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::CancelOrderCtxData;
use crate::services::order_lifecycle;
use bookshop_flow::{ContextData, Pipeline, PipelineControl, Registry};
use std::sync::Arc;
use tracing::{instrument, warn};

type Ctx = ContextData<CancelOrderCtxData>;

pub fn register_cancel_order_pipeline(registry: &Arc<Registry<AppError>>) {
  let mut p = Pipeline::<CancelOrderCtxData, AppError>::new(&[
    ("load_order", false, None),
    ("authorize_cancellation", false, None),
    ("guard_cancellable", false, None),
    ("cancel_and_restock", false, None),
  ]);

  p.on_root("load_order", load_order);
  p.on_root("authorize_cancellation", authorize_cancellation);
  p.on_root("guard_cancellable", guard_cancellable);
  p.on_root("cancel_and_restock", cancel_and_restock);

  registry.register_pipeline(p);
}

#[instrument(name = "cancel_order::load_order", skip(ctx), err)]
async fn load_order(ctx: Ctx) -> AppResult<PipelineControl> {
  let (store, order_id) = {
    let guard = ctx.read();
    (guard.app_state.store.clone(), guard.order_id)
  };
  let order = common_steps::load_order(store.as_ref(), order_id).await?;
  ctx.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "cancel_order::authorize", skip(ctx), err)]
async fn authorize_cancellation(ctx: Ctx) -> AppResult<PipelineControl> {
  let guard = ctx.read();
  let owner_id = guard
    .order
    .as_ref()
    .map(|o| o.order.customer_id)
    .ok_or_else(|| AppError::Internal("order not loaded".to_string()))?;
  if !guard.actor.may_access(owner_id) {
    warn!(order_id = %guard.order_id, user_id = %guard.actor.user_id, "Cancellation of another customer's order refused.");
    return Err(AppError::Forbidden("You can only cancel your own orders.".to_string()));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "cancel_order::guard_cancellable", skip(ctx), err)]
async fn guard_cancellable(ctx: Ctx) -> AppResult<PipelineControl> {
  let guard = ctx.read();
  let status = guard
    .order
    .as_ref()
    .map(|o| o.status())
    .ok_or_else(|| AppError::Internal("order not loaded".to_string()))?;
  order_lifecycle::check_transition(guard.order_id, status, OrderStatus::Cancelled)?;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "cancel_order::cancel_and_restock", skip(ctx), err)]
async fn cancel_and_restock(ctx: Ctx) -> AppResult<PipelineControl> {
  let (store, order_id) = {
    let guard = ctx.read();
    (guard.app_state.store.clone(), guard.order_id)
  };
  let cancelled = common_steps::commit_transition(
    store.as_ref(),
    order_id,
    OrderStatus::Pending,
    OrderStatus::Cancelled,
    |current| order_lifecycle::stale_rejection(order_id, current, OrderStatus::Cancelled),
  )
  .await?;
  ctx.write().order = Some(cancelled);
  Ok(PipelineControl::Continue)
}
