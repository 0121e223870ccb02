// apps/bookshop/src/services/order_lifecycle.rs

//! Legal order status moves: `Pending -> Completed` and `Pending -> Cancelled`. Both
//! targets are terminal.

use uuid::Uuid;

use crate::errors::OrderError;
use crate::models::OrderStatus;

/// Checks a requested move. Asking for the terminal state an order is already in is
/// `AlreadyProcessed`; every other illegal move is `InvalidTransition`.
pub fn check_transition(order_id: Uuid, from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
  match (from, to) {
    (OrderStatus::Pending, OrderStatus::Completed) | (OrderStatus::Pending, OrderStatus::Cancelled) => Ok(()),
    (f, t) if f == t && f.is_terminal() => Err(OrderError::AlreadyProcessed { order_id, status: f }),
    (f, t) => Err(OrderError::InvalidTransition { order_id, from: f, to: t }),
  }
}

/// Claim-code redemption only succeeds on a pending order; anything already settled,
/// completed or cancelled, reports `AlreadyProcessed`.
pub fn ensure_redeemable(order_id: Uuid, current: OrderStatus) -> Result<(), OrderError> {
  match current {
    OrderStatus::Pending => Ok(()),
    status => Err(OrderError::AlreadyProcessed { order_id, status }),
  }
}

/// Error for a compare-and-set that found the order in `current` instead of `Pending`.
pub fn stale_rejection(order_id: Uuid, current: OrderStatus, wanted: OrderStatus) -> OrderError {
  match check_transition(order_id, current, wanted) {
    Err(e) => e,
    Ok(()) => OrderError::InvalidTransition {
      order_id,
      from: current,
      to: wanted,
    },
  }
}
