// apps/bookshop/src/pipelines/contexts.rs

//! Context data of the order workflows. Handlers receive these wrapped in
//! `bookshop_flow::ContextData`.

use crate::models::{CartLine, OrderDetails, OrderStatus, PricedLine, User, Actor};
use crate::services::pricing::OrderTotals;
use crate::state::AppState;
use uuid::Uuid;

/// Cart to persisted order.
#[derive(Clone)]
pub struct PlaceOrderCtxData {
  pub app_state: AppState,
  pub customer_id: Uuid,
  pub lines: Vec<CartLine>,
  pub request_key: Option<String>,

  pub merged: Vec<(Uuid, i32)>,
  pub customer: Option<User>,
  pub priced: Vec<PricedLine>,
  pub totals: OrderTotals,
  pub claim_code: Option<String>,
  /// Set once the order exists in the store, whether written now or found by request key.
  pub order: Option<OrderDetails>,
  /// The request key matched an earlier order; nothing new was written.
  pub replayed: bool,
}

impl PlaceOrderCtxData {
  pub fn new(app_state: AppState, customer_id: Uuid, lines: Vec<CartLine>, request_key: Option<String>) -> Self {
    Self {
      app_state,
      customer_id,
      lines,
      request_key,
      merged: Vec::new(),
      customer: None,
      priced: Vec::new(),
      totals: OrderTotals::default(),
      claim_code: None,
      order: None,
      replayed: false,
    }
  }
}

/// Claim code presented at the pickup counter.
#[derive(Clone)]
pub struct RedeemClaimCtxData {
  pub app_state: AppState,
  pub raw_code: String,
  pub claim_code: Option<String>,
  pub order: Option<OrderDetails>,
}

impl RedeemClaimCtxData {
  pub fn new(app_state: AppState, raw_code: impl Into<String>) -> Self {
    Self {
      app_state,
      raw_code: raw_code.into(),
      claim_code: None,
      order: None,
    }
  }
}

/// Customer- or staff-initiated cancellation.
#[derive(Clone)]
pub struct CancelOrderCtxData {
  pub app_state: AppState,
  pub actor: Actor,
  pub order_id: Uuid,
  pub order: Option<OrderDetails>,
}

impl CancelOrderCtxData {
  pub fn new(app_state: AppState, actor: Actor, order_id: Uuid) -> Self {
    Self {
      app_state,
      actor,
      order_id,
      order: None,
    }
  }
}

/// Staff status override.
#[derive(Clone)]
pub struct StatusUpdateCtxData {
  pub app_state: AppState,
  pub order_id: Uuid,
  pub target: OrderStatus,
  pub order: Option<OrderDetails>,
}

impl StatusUpdateCtxData {
  pub fn new(app_state: AppState, order_id: Uuid, target: OrderStatus) -> Self {
    Self {
      app_state,
      order_id,
      target,
      order: None,
    }
  }
}
