// apps/bookshop/src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::OrderItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status_enum", rename_all = "lowercase")]
pub enum OrderStatus {
  #[serde(alias = "pending")]
  Pending,
  #[serde(alias = "completed")]
  Completed,
  #[serde(alias = "cancelled", alias = "Canceled", alias = "canceled")]
  Cancelled,
}

impl OrderStatus {
  pub fn is_terminal(self) -> bool {
    !matches!(self, OrderStatus::Pending)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "Pending",
      OrderStatus::Completed => "Completed",
      OrderStatus::Cancelled => "Cancelled",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pending" => Ok(OrderStatus::Pending),
      "completed" => Ok(OrderStatus::Completed),
      "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
      other => Err(format!("unknown order status '{}'", other)),
    }
  }
}

/// Order header. Amounts are snapshots taken at creation and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  #[serde(rename = "orderId")]
  pub id: Uuid,
  pub customer_id: Uuid,
  pub customer_name: String,
  pub customer_email: String,
  pub claim_code: String,
  pub status: OrderStatus,
  pub order_date: DateTime<Utc>,
  pub subtotal_cents: i64,
  pub discount_applied_cents: i64,
  pub total_amount_cents: i64,
  pub total_quantity: i32,
  #[serde(skip_serializing)]
  pub request_key: Option<String>,
  pub updated_at: DateTime<Utc>,
}

/// An order together with its line items, as returned by every order endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
  #[serde(flatten)]
  pub order: Order,
  pub order_items: Vec<OrderItem>,
}

impl OrderDetails {
  pub fn id(&self) -> Uuid {
    self.order.id
  }

  pub fn status(&self) -> OrderStatus {
    self.order.status
  }
}
