// apps/bookshop/src/models/book.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::services::pricing;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
  #[serde(rename = "bookId")]
  pub id: Uuid,
  pub title: String,
  pub author: String,
  pub isbn: String,
  pub genre: String,
  pub language: String,
  pub format: String,
  pub publisher: String,
  pub publication_date: Option<NaiveDate>,
  pub description: Option<String>,
  pub photo_url: Option<String>,
  pub price_cents: i64,
  pub stock: i32,
  pub on_sale: bool,
  pub discount_percentage: Option<i32>,
  pub discount_start: Option<DateTime<Utc>>,
  pub discount_end: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Book {
  pub fn discount_active(&self, now: DateTime<Utc>) -> bool {
    pricing::sale_active(self.on_sale, self.discount_start, self.discount_end, now)
  }

  /// Unit price a customer pays right now.
  pub fn effective_price_cents(&self, now: DateTime<Utc>) -> i64 {
    pricing::effective_unit_price(self, now)
  }
}

/// A book as shown in the catalog, with its current selling price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
  #[serde(flatten)]
  pub book: Book,
  pub effective_price_cents: i64,
  pub discount_active: bool,
}

impl BookView {
  pub fn at(book: Book, now: DateTime<Utc>) -> Self {
    let effective_price_cents = book.effective_price_cents(now);
    let discount_active = book.discount_active(now);
    Self {
      book,
      effective_price_cents,
      discount_active,
    }
  }
}

/// Highest list price accepted for a catalog entry ($1,000,000).
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Body of `POST /Books` and `PUT /Books/{bookId}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
  pub title: String,
  pub author: String,
  pub isbn: String,
  pub genre: String,
  #[serde(default = "default_language")]
  pub language: String,
  #[serde(default = "default_format")]
  pub format: String,
  #[serde(default)]
  pub publisher: String,
  pub publication_date: Option<NaiveDate>,
  pub description: Option<String>,
  pub photo_url: Option<String>,
  pub price_cents: i64,
  pub stock: i32,
  #[serde(default)]
  pub on_sale: bool,
  pub discount_percentage: Option<i32>,
  pub discount_start: Option<DateTime<Utc>>,
  pub discount_end: Option<DateTime<Utc>>,
}

fn default_language() -> String {
  "English".to_string()
}

fn default_format() -> String {
  "Paperback".to_string()
}

impl BookInput {
  pub fn validate(&self) -> Result<()> {
    let required = [("title", &self.title), ("author", &self.author), ("isbn", &self.isbn), ("genre", &self.genre)];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
      return Err(AppError::Validation(format!("'{}' is required.", field)));
    }
    if self.price_cents <= 0 {
      return Err(AppError::Validation("Price must be greater than zero.".to_string()));
    }
    if self.price_cents > MAX_PRICE_CENTS {
      return Err(AppError::Validation(format!(
        "Price cannot exceed {} cents.",
        MAX_PRICE_CENTS
      )));
    }
    if self.stock < 0 {
      return Err(AppError::Validation("Stock cannot be negative.".to_string()));
    }
    if let Some(pct) = self.discount_percentage {
      if !(0..=100).contains(&pct) {
        return Err(AppError::Validation("Discount percentage must be between 0 and 100.".to_string()));
      }
    }
    if let (Some(start), Some(end)) = (self.discount_start, self.discount_end) {
      if start > end {
        return Err(AppError::Validation("Discount start must not be after its end.".to_string()));
      }
    }
    Ok(())
  }

  /// Validates and builds a new catalog entry.
  pub fn into_new_book(self, now: DateTime<Utc>) -> Result<Book> {
    self.validate()?;
    Ok(self.apply_to(Uuid::new_v4(), now, now))
  }

  /// Validates and applies the input over an existing entry, keeping its identity.
  pub fn into_update_of(self, existing: &Book, now: DateTime<Utc>) -> Result<Book> {
    self.validate()?;
    Ok(self.apply_to(existing.id, existing.created_at, now))
  }

  fn apply_to(self, id: Uuid, created_at: DateTime<Utc>, now: DateTime<Utc>) -> Book {
    Book {
      id,
      title: self.title.trim().to_string(),
      author: self.author.trim().to_string(),
      isbn: self.isbn.trim().to_string(),
      genre: self.genre.trim().to_string(),
      language: self.language,
      format: self.format,
      publisher: self.publisher,
      publication_date: self.publication_date,
      description: self.description,
      photo_url: self.photo_url,
      price_cents: self.price_cents,
      stock: self.stock,
      on_sale: self.on_sale,
      discount_percentage: self.discount_percentage,
      discount_start: self.discount_start,
      discount_end: self.discount_end,
      created_at,
      updated_at: now,
    }
  }
}
