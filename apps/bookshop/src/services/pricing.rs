// apps/bookshop/src/services/pricing.rs

//! Money math for orders. All amounts are integer cents; percentages round half up.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::OrderError;
use crate::models::{Book, CartLine, PricedLine};

/// A sale is active when flagged and `now` lies inside its window; a missing bound is open.
pub fn sale_active(
  on_sale: bool,
  start: Option<DateTime<Utc>>,
  end: Option<DateTime<Utc>>,
  now: DateTime<Utc>,
) -> bool {
  on_sale && start.map_or(true, |s| s <= now) && end.map_or(true, |e| now <= e)
}

/// `percent`% of `amount_cents`, rounded half up to the cent. `percent` is clamped to 0..=100,
/// so the result never exceeds `amount_cents`.
pub fn percent_of(amount_cents: i64, percent: i64) -> i64 {
  let scaled = (i128::from(amount_cents) * i128::from(percent.clamp(0, 100)) + 50) / 100;
  scaled as i64
}

pub fn effective_unit_price(book: &Book, now: DateTime<Utc>) -> i64 {
  if !book.discount_active(now) {
    return book.price_cents;
  }
  let pct = i64::from(book.discount_percentage.unwrap_or(0).clamp(0, 100));
  book.price_cents - percent_of(book.price_cents, pct)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkDiscountRule {
  pub threshold_units: i64,
  pub percent: i64,
}

impl Default for BulkDiscountRule {
  fn default() -> Self {
    Self {
      threshold_units: 5,
      percent: 5,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderTotals {
  pub subtotal_cents: i64,
  pub discount_cents: i64,
  pub total_cents: i64,
  pub total_quantity: i64,
}

/// Checks the cart and folds repeated books into one line, keeping first-seen order.
pub fn merge_lines(lines: &[CartLine]) -> Result<Vec<(Uuid, i32)>, OrderError> {
  if lines.is_empty() {
    return Err(OrderError::EmptyCart);
  }
  let mut merged: Vec<(Uuid, i64)> = Vec::with_capacity(lines.len());
  for line in lines {
    if line.quantity < 1 {
      return Err(OrderError::InvalidQuantity {
        book_id: line.book_id,
        quantity: line.quantity,
      });
    }
    match merged.iter_mut().find(|(id, _)| *id == line.book_id) {
      Some((_, qty)) => *qty = qty.saturating_add(line.quantity),
      None => merged.push((line.book_id, line.quantity)),
    }
  }
  merged
    .into_iter()
    .map(|(book_id, qty)| {
      i32::try_from(qty)
        .map(|q| (book_id, q))
        .map_err(|_| OrderError::InvalidQuantity { book_id, quantity: qty })
    })
    .collect()
}

/// Resolves the current unit price of every line and checks it against stock.
pub fn price_lines(
  merged: &[(Uuid, i32)],
  books: &HashMap<Uuid, Book>,
  now: DateTime<Utc>,
) -> Result<Vec<PricedLine>, OrderError> {
  merged
    .iter()
    .map(|&(book_id, quantity)| {
      let book = books.get(&book_id).ok_or(OrderError::BookNotFound(book_id))?;
      if book.stock < quantity {
        return Err(OrderError::InsufficientStock {
          book_id,
          requested: i64::from(quantity),
          available: i64::from(book.stock),
        });
      }
      Ok(PricedLine {
        book_id,
        title: book.title.clone(),
        author: book.author.clone(),
        photo_url: book.photo_url.clone(),
        quantity,
        unit_price_cents: effective_unit_price(book, now),
      })
    })
    .collect()
}

/// Fails with `AmountTooLarge` when the subtotal does not fit in `i64` cents.
pub fn totals(lines: &[PricedLine], rule: &BulkDiscountRule) -> Result<OrderTotals, OrderError> {
  let subtotal_cents = lines
    .iter()
    .try_fold(0i64, |acc, line| line.line_total_cents().and_then(|t| acc.checked_add(t)))
    .ok_or(OrderError::AmountTooLarge)?;
  let total_quantity: i64 = lines.iter().map(|l| i64::from(l.quantity)).sum();
  let discount_cents = if total_quantity >= rule.threshold_units {
    percent_of(subtotal_cents, rule.percent)
  } else {
    0
  };
  Ok(OrderTotals {
    subtotal_cents,
    discount_cents,
    total_cents: subtotal_cents - discount_cents,
    total_quantity,
  })
}

/// `4275` -> `"42.75"`.
pub fn format_cents(cents: i64) -> String {
  let sign = if cents < 0 { "-" } else { "" };
  let abs = cents.unsigned_abs();
  format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
