// apps/bookshop/src/services/order_service.rs

//! Order operations. Commands run their registered pipeline; queries go straight to the
//! store.

use bookshop_flow::{ContextData, PipelineResult};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{OrderQuery, Page, MAX_PAGE_SIZE};
use crate::errors::{AppError, OrderError, Result};
use crate::models::{Actor, CartLine, OrderDetails, OrderStatus};
use crate::pipelines::contexts::{CancelOrderCtxData, PlaceOrderCtxData, RedeemClaimCtxData, StatusUpdateCtxData};
use crate::state::AppState;

/// Result of `create_order`. `replayed` is set when the request key matched an earlier order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
  #[serde(flatten)]
  pub order: OrderDetails,
  pub replayed: bool,
}

fn clamp_paging(page: Option<u32>, page_size: Option<u32>) -> (u32, u32) {
  (
    page.unwrap_or(1).max(1),
    page_size.unwrap_or(crate::db::DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
  )
}

#[instrument(name = "order_service::create_order", skip(state, lines), fields(lines = lines.len()), err)]
pub async fn create_order(
  state: &AppState,
  customer_id: Uuid,
  lines: Vec<CartLine>,
  request_key: Option<String>,
) -> Result<PlacedOrder> {
  let request_key = request_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
  let ctx = ContextData::new(PlaceOrderCtxData::new(state.clone(), customer_id, lines, request_key));

  let outcome = state.flows.run(ctx.clone()).await?;
  let guard = ctx.read();
  let order = guard.order.clone().ok_or_else(|| {
    warn!(?outcome, "Order pipeline finished without an order.");
    AppError::PipelineHaltedByHandler
  })?;
  Ok(PlacedOrder {
    order,
    replayed: guard.replayed,
  })
}

#[instrument(name = "order_service::process_order_by_claim_code", skip(state, code), err)]
pub async fn process_order_by_claim_code(state: &AppState, code: &str) -> Result<OrderDetails> {
  let ctx = ContextData::new(RedeemClaimCtxData::new(state.clone(), code));
  let outcome = state.flows.run(ctx.clone()).await?;
  let order = ctx.read().order.clone();
  finished_order(outcome, order)
}

#[instrument(name = "order_service::cancel_order", skip(state), fields(user_id = %actor.user_id), err)]
pub async fn cancel_order(state: &AppState, actor: &Actor, order_id: Uuid) -> Result<OrderDetails> {
  let ctx = ContextData::new(CancelOrderCtxData::new(state.clone(), *actor, order_id));
  let outcome = state.flows.run(ctx.clone()).await?;
  let order = ctx.read().order.clone();
  finished_order(outcome, order)
}

#[instrument(name = "order_service::update_order_status", skip(state), err)]
pub async fn update_order_status(state: &AppState, order_id: Uuid, status: OrderStatus) -> Result<OrderDetails> {
  let ctx = ContextData::new(StatusUpdateCtxData::new(state.clone(), order_id, status));
  let outcome = state.flows.run(ctx.clone()).await?;
  let order = ctx.read().order.clone();
  let order = finished_order(outcome, order)?;
  info!(%order_id, status = %order.status(), "Order status updated by staff.");
  Ok(order)
}

fn finished_order(outcome: PipelineResult, order: Option<OrderDetails>) -> Result<OrderDetails> {
  match (outcome, order) {
    (PipelineResult::Completed, Some(order)) => Ok(order),
    (PipelineResult::Stopped, _) => Err(AppError::PipelineHaltedByHandler),
    (PipelineResult::Completed, None) => Err(AppError::Internal("workflow finished without an order".to_string())),
  }
}

/// An order visible to `actor`. Other customers' orders read as not found.
#[instrument(name = "order_service::get_order_for", skip(state), fields(user_id = %actor.user_id), err)]
pub async fn get_order_for(state: &AppState, actor: &Actor, order_id: Uuid) -> Result<OrderDetails> {
  match state.store.find_order(order_id).await? {
    Some(order) if actor.may_access(order.order.customer_id) => Ok(order),
    _ => Err(OrderError::OrderNotFound(order_id).into()),
  }
}

#[instrument(name = "order_service::list_orders", skip(state), err)]
pub async fn list_orders(
  state: &AppState,
  status: Option<OrderStatus>,
  customer_id: Option<Uuid>,
  page: Option<u32>,
  page_size: Option<u32>,
) -> Result<Page<OrderDetails>> {
  let (page, page_size) = clamp_paging(page, page_size);
  let query = OrderQuery {
    status,
    customer_id,
    page,
    page_size,
  };
  Ok(state.store.list_orders(&query).await?)
}

pub async fn my_orders(
  state: &AppState,
  actor: &Actor,
  page: Option<u32>,
  page_size: Option<u32>,
) -> Result<Page<OrderDetails>> {
  list_orders(state, None, Some(actor.user_id), page, page_size).await
}
