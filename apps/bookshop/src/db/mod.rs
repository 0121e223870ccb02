// apps/bookshop/src/db/mod.rs

//! Persistence collaborator. Order workflows only talk to [`Store`]; `PgStore` backs
//! production and `MemoryStore` backs tests and `STORAGE_BACKEND=memory`.

pub mod memory;
pub mod postgres;
pub mod seed;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{AppConfig, StorageBackend};
use crate::models::{Book, OrderDetails, OrderStatus, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("insufficient stock for book {book_id}: requested {requested}, available {available}")]
  InsufficientStock {
    book_id: Uuid,
    requested: i64,
    available: i64,
  },

  #[error("book {0} does not exist")]
  BookNotFound(Uuid),

  #[error("claim code already assigned to another order")]
  ClaimCodeTaken,

  #[error("an order with this request key already exists for the customer")]
  DuplicateRequest,

  #[error("store unavailable: {0}")]
  Unavailable(String),

  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
  /// The order was in the expected status and now holds the new one.
  Applied(OrderDetails),
  /// Another writer got there first; nothing was changed.
  Stale { current: OrderStatus },
  Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSort {
  #[default]
  Title,
  PriceAsc,
  PriceDesc,
  Newest,
}

impl FromStr for BookSort {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "" | "title" => Ok(BookSort::Title),
      "priceasc" | "price" => Ok(BookSort::PriceAsc),
      "pricedesc" => Ok(BookSort::PriceDesc),
      "newest" => Ok(BookSort::Newest),
      other => Err(format!("unknown sort '{}': expected title, priceAsc, priceDesc or newest", other)),
    }
  }
}

/// Catalog filter. `now` decides which sales are active.
#[derive(Debug, Clone)]
pub struct BookQuery {
  pub search: Option<String>,
  pub genre: Option<String>,
  pub author: Option<String>,
  pub on_sale_only: bool,
  pub sort: BookSort,
  pub page: u32,
  pub page_size: u32,
  pub now: DateTime<Utc>,
}

impl Default for BookQuery {
  fn default() -> Self {
    Self {
      search: None,
      genre: None,
      author: None,
      on_sale_only: false,
      sort: BookSort::Title,
      page: 1,
      page_size: DEFAULT_PAGE_SIZE,
      now: Utc::now(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct OrderQuery {
  pub status: Option<OrderStatus>,
  pub customer_id: Option<Uuid>,
  pub page: u32,
  pub page_size: u32,
}

impl Default for OrderQuery {
  fn default() -> Self {
    Self {
      status: None,
      customer_id: None,
      page: 1,
      page_size: DEFAULT_PAGE_SIZE,
    }
  }
}

pub fn offset(page: u32, page_size: u32) -> i64 {
  i64::from(page.saturating_sub(1)) * i64::from(page_size)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: u32,
  pub page_size: u32,
  pub total_count: i64,
  pub total_pages: i64,
}

impl<T> Page<T> {
  pub fn new(items: Vec<T>, page: u32, page_size: u32, total_count: i64) -> Self {
    let size = i64::from(page_size.max(1));
    Self {
      items,
      page,
      page_size,
      total_count,
      total_pages: (total_count + size - 1) / size,
    }
  }

  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      items: self.items.into_iter().map(f).collect(),
      page: self.page,
      page_size: self.page_size,
      total_count: self.total_count,
      total_pages: self.total_pages,
    }
  }
}

#[async_trait]
pub trait Store: Send + Sync {
  async fn ping(&self) -> StoreResult<()>;

  async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
  async fn upsert_user(&self, user: &User) -> StoreResult<()>;

  async fn list_books(&self, query: &BookQuery) -> StoreResult<Page<Book>>;
  async fn find_book(&self, id: Uuid) -> StoreResult<Option<Book>>;
  async fn find_books(&self, ids: &[Uuid]) -> StoreResult<Vec<Book>>;
  async fn insert_book(&self, book: &Book) -> StoreResult<()>;
  /// Replaces a book's fields; `None` when it does not exist.
  async fn update_book(&self, book: &Book) -> StoreResult<Option<Book>>;

  async fn claim_code_exists(&self, code: &str) -> StoreResult<bool>;
  async fn find_order_by_request_key(&self, customer_id: Uuid, request_key: &str) -> StoreResult<Option<OrderDetails>>;

  /// Writes the order and its items and takes their quantities out of stock, all or nothing.
  ///
  /// Fails with `ClaimCodeTaken` or `DuplicateRequest` on the unique constraints and with
  /// `InsufficientStock` / `BookNotFound` when a line cannot be covered.
  async fn insert_order(&self, order: &OrderDetails) -> StoreResult<()>;

  async fn find_order(&self, id: Uuid) -> StoreResult<Option<OrderDetails>>;
  async fn find_order_by_claim_code(&self, code: &str) -> StoreResult<Option<OrderDetails>>;
  /// Newest first.
  async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Page<OrderDetails>>;

  /// Atomically moves an order from `expected` to `next`. Moving a pending order to
  /// `Cancelled` puts its quantities back into stock in the same write.
  async fn transition_order(&self, id: Uuid, expected: OrderStatus, next: OrderStatus)
    -> StoreResult<TransitionOutcome>;
}

/// Opens the configured backend, applying migrations when asked to.
pub async fn connect(config: &AppConfig) -> StoreResult<Arc<dyn Store>> {
  match config.storage_backend {
    StorageBackend::Memory => {
      tracing::info!("Using in-memory store.");
      Ok(Arc::new(MemoryStore::new()))
    }
    StorageBackend::Postgres => {
      let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| StoreError::Unavailable("DATABASE_URL is not set".to_string()))?;
      let store = PgStore::connect(url).await?;
      if config.run_migrations {
        store.migrate().await?;
      }
      Ok(Arc::new(store))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_counts_round_up() {
    let page: Page<u8> = Page::new(vec![], 1, 20, 41);
    assert_eq!(page.total_pages, 3);
    assert_eq!(Page::<u8>::new(vec![], 1, 20, 0).total_pages, 0);
    assert_eq!(Page::<u8>::new(vec![], 1, 20, 20).total_pages, 1);
  }

  #[test]
  fn sort_names_follow_the_storefront() {
    assert_eq!("priceAsc".parse::<BookSort>(), Ok(BookSort::PriceAsc));
    assert_eq!("PRICEDESC".parse::<BookSort>(), Ok(BookSort::PriceDesc));
    assert_eq!("".parse::<BookSort>(), Ok(BookSort::Title));
    assert!("rating".parse::<BookSort>().is_err());
  }

  #[test]
  fn offsets_start_at_page_one() {
    assert_eq!(offset(1, 20), 0);
    assert_eq!(offset(3, 20), 40);
    assert_eq!(offset(0, 20), 0);
  }
}
