// apps/bookshop/src/pipelines/common_steps.rs

//! Store operations shared by the lifecycle pipelines.

use crate::db::{Store, TransitionOutcome};
use crate::errors::{AppError, OrderError, Result as AppResult};
use crate::models::{OrderDetails, OrderStatus};
use tracing::{event, instrument, Level};
use uuid::Uuid;

#[instrument(name = "common_step::load_order", skip(store), err)]
pub async fn load_order(store: &dyn Store, order_id: Uuid) -> AppResult<OrderDetails> {
  store
    .find_order(order_id)
    .await?
    .ok_or(AppError::Order(OrderError::OrderNotFound(order_id)))
}

/// Compare-and-set of an order's status. When another writer moved the order first,
/// `on_stale` turns the status it found into the error reported to the caller.
#[instrument(name = "common_step::commit_transition", skip(store, on_stale), err)]
pub async fn commit_transition(
  store: &dyn Store,
  order_id: Uuid,
  expected: OrderStatus,
  next: OrderStatus,
  on_stale: impl FnOnce(OrderStatus) -> OrderError + Send,
) -> AppResult<OrderDetails> {
  match store.transition_order(order_id, expected, next).await? {
    TransitionOutcome::Applied(details) => {
      event!(Level::INFO, %order_id, from = %expected, to = %next, "Order status changed.");
      Ok(details)
    }
    TransitionOutcome::Stale { current } => {
      event!(Level::WARN, %order_id, %current, wanted = %next, "Order moved by a concurrent request.");
      Err(AppError::Order(on_stale(current)))
    }
    TransitionOutcome::Missing => Err(AppError::Order(OrderError::OrderNotFound(order_id))),
  }
}
