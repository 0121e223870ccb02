// apps/bookshop/src/models/order_item.rs

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One line of an order. Book fields are copied so history survives catalog edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  #[serde(rename = "orderItemId")]
  pub id: Uuid,
  pub order_id: Uuid,
  #[serde(skip_serializing)]
  pub line_no: i32,
  pub book_id: Uuid,
  pub quantity: i32,
  pub unit_price_cents: i64,
  pub book_title: String,
  pub book_author: String,
  pub book_photo_url: Option<String>,
}

impl OrderItem {
  pub fn line_total_cents(&self) -> Option<i64> {
    self.unit_price_cents.checked_mul(i64::from(self.quantity))
  }
}
