// apps/bookshop/src/pipelines/redeem_claim_pipeline.rs

//! Pickup counter: a claim code moves its pending order to `Completed`, exactly once.

use crate::errors::{AppError, OrderError, Result as AppResult};
use crate::models::OrderStatus;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::RedeemClaimCtxData;
use crate::services::claim_code::{self, log_prefix};
use crate::services::order_lifecycle;
use bookshop_flow::{ContextData, Pipeline, PipelineControl, Registry};
use std::sync::Arc;
use tracing::{info, instrument, warn};

type Ctx = ContextData<RedeemClaimCtxData>;

pub fn register_redeem_claim_pipeline(registry: &Arc<Registry<AppError>>) {
  let mut p = Pipeline::<RedeemClaimCtxData, AppError>::new(&[
    ("normalize_claim_code", false, None),
    ("lookup_order_by_claim_code", false, None),
    ("guard_pending", false, None),
    ("mark_completed", false, None),
  ]);

  p.on_root("normalize_claim_code", normalize_claim_code);
  p.on_root("lookup_order_by_claim_code", lookup_order_by_claim_code);
  p.on_root("guard_pending", guard_pending);
  p.on_root("mark_completed", mark_completed);

  registry.register_pipeline(p);
}

#[instrument(name = "redeem_claim::normalize_claim_code", skip(ctx), err)]
async fn normalize_claim_code(ctx: Ctx) -> AppResult<PipelineControl> {
  let mut guard = ctx.write();
  let code = claim_code::normalize(&guard.raw_code)
    .ok_or_else(|| AppError::Validation("A claim code is required.".to_string()))?;
  guard.claim_code = Some(code);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "redeem_claim::lookup_order", skip(ctx), err)]
async fn lookup_order_by_claim_code(ctx: Ctx) -> AppResult<PipelineControl> {
  let (store, code) = {
    let guard = ctx.read();
    (guard.app_state.store.clone(), guard.claim_code.clone().unwrap_or_default())
  };
  match store.find_order_by_claim_code(&code).await? {
    Some(order) => {
      info!(order_id = %order.id(), code_prefix = log_prefix(&code), "Claim code matched an order.");
      ctx.write().order = Some(order);
      Ok(PipelineControl::Continue)
    }
    None => {
      warn!(code_prefix = log_prefix(&code), "Unknown claim code presented.");
      Err(OrderError::ClaimCodeNotFound.into())
    }
  }
}

#[instrument(name = "redeem_claim::guard_pending", skip(ctx), err)]
async fn guard_pending(ctx: Ctx) -> AppResult<PipelineControl> {
  let guard = ctx.read();
  let order = guard
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("order not loaded".to_string()))?;
  order_lifecycle::ensure_redeemable(order.id(), order.status())?;
  Ok(PipelineControl::Continue)
}

/// The conditional write decides between concurrent redemptions of the same code.
#[instrument(name = "redeem_claim::mark_completed", skip(ctx), err)]
async fn mark_completed(ctx: Ctx) -> AppResult<PipelineControl> {
  let (store, order_id) = {
    let guard = ctx.read();
    let order_id = guard
      .order
      .as_ref()
      .map(|o| o.id())
      .ok_or_else(|| AppError::Internal("order not loaded".to_string()))?;
    (guard.app_state.store.clone(), order_id)
  };
  let completed = common_steps::commit_transition(
    store.as_ref(),
    order_id,
    OrderStatus::Pending,
    OrderStatus::Completed,
    |current| OrderError::AlreadyProcessed {
      order_id,
      status: current,
    },
  )
  .await?;
  ctx.write().order = Some(completed);
  Ok(PipelineControl::Continue)
}
