// apps/bookshop/src/models/cart.rs

use serde::Deserialize;
use uuid::Uuid;

/// A cart line as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
  pub book_id: Uuid,
  pub quantity: i64,
  /// Sent by the storefront but never trusted: prices are resolved from the catalog.
  #[serde(default)]
  pub unit_price: Option<f64>,
}

impl CartLine {
  pub fn new(book_id: Uuid, quantity: i64) -> Self {
    Self {
      book_id,
      quantity,
      unit_price: None,
    }
  }
}

/// A validated, priced line ready to become an `OrderItem`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
  pub book_id: Uuid,
  pub title: String,
  pub author: String,
  pub photo_url: Option<String>,
  pub quantity: i32,
  pub unit_price_cents: i64,
}

impl PricedLine {
  /// `None` when the line total does not fit in `i64` cents.
  pub fn line_total_cents(&self) -> Option<i64> {
    self.unit_price_cents.checked_mul(i64::from(self.quantity))
  }
}
