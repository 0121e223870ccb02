// apps/bookshop/src/db/memory.rs

//! In-memory [`Store`]. One mutex guards every table, so each call is atomic the way a
//! single database transaction would be.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use super::{offset, BookQuery, BookSort, OrderQuery, Page, Store, StoreError, StoreResult, TransitionOutcome};
use crate::models::{Book, Order, OrderDetails, OrderItem, OrderStatus, User};

#[derive(Default)]
struct Tables {
  users: HashMap<Uuid, User>,
  books: HashMap<Uuid, Book>,
  orders: HashMap<Uuid, Order>,
  items: HashMap<Uuid, Vec<OrderItem>>,
  by_claim_code: HashMap<String, Uuid>,
  by_request_key: HashMap<(Uuid, String), Uuid>,
}

impl Tables {
  fn details(&self, id: Uuid) -> Option<OrderDetails> {
    let order = self.orders.get(&id)?.clone();
    let order_items = self.items.get(&id).cloned().unwrap_or_default();
    Some(OrderDetails { order, order_items })
  }
}

#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
  unavailable: AtomicBool,
  blind_claim_lookup: AtomicBool,
  request_lookup_misses: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes every call fail with `StoreError::Unavailable` until switched back.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  /// Makes `claim_code_exists` always answer `false`, so a taken code is only caught
  /// by the unique check in `insert_order`.
  pub fn set_blind_claim_lookup(&self, blind: bool) {
    self.blind_claim_lookup.store(blind, Ordering::SeqCst);
  }

  /// Makes the next `count` calls to `find_order_by_request_key` answer `None`, as when
  /// concurrent submissions all look before any of them has committed.
  pub fn miss_next_request_lookups(&self, count: usize) {
    self.request_lookup_misses.store(count, Ordering::SeqCst);
  }

  pub fn book_stock(&self, id: Uuid) -> Option<i32> {
    self.tables.lock().books.get(&id).map(|b| b.stock)
  }

  pub fn order_count(&self) -> usize {
    self.tables.lock().orders.len()
  }

  fn check_available(&self) -> StoreResult<()> {
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("memory store switched off".to_string()));
    }
    Ok(())
  }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
  haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches_book(book: &Book, q: &BookQuery) -> bool {
  if let Some(term) = q.search.as_deref() {
    if !contains_ci(&book.title, term) && !contains_ci(&book.author, term) {
      return false;
    }
  }
  if let Some(genre) = q.genre.as_deref() {
    if !book.genre.eq_ignore_ascii_case(genre) {
      return false;
    }
  }
  if let Some(author) = q.author.as_deref() {
    if !contains_ci(&book.author, author) {
      return false;
    }
  }
  !q.on_sale_only || book.discount_active(q.now)
}

#[async_trait]
impl Store for MemoryStore {
  async fn ping(&self) -> StoreResult<()> {
    self.check_available()
  }

  async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
    self.check_available()?;
    Ok(self.tables.lock().users.get(&id).cloned())
  }

  async fn upsert_user(&self, user: &User) -> StoreResult<()> {
    self.check_available()?;
    self.tables.lock().users.insert(user.id, user.clone());
    Ok(())
  }

  async fn list_books(&self, query: &BookQuery) -> StoreResult<Page<Book>> {
    self.check_available()?;
    let tables = self.tables.lock();
    let mut books: Vec<&Book> = tables.books.values().filter(|b| matches_book(b, query)).collect();
    let now = query.now;
    match query.sort {
      BookSort::Title => books.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()).then(a.id.cmp(&b.id))),
      BookSort::PriceAsc => books.sort_by_key(|b| (b.effective_price_cents(now), b.id)),
      BookSort::PriceDesc => {
        books.sort_by(|a, b| b.effective_price_cents(now).cmp(&a.effective_price_cents(now)).then(a.id.cmp(&b.id)))
      }
      BookSort::Newest => books.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id))),
    }
    let total = books.len() as i64;
    let skip = usize::try_from(offset(query.page, query.page_size)).unwrap_or(usize::MAX);
    let items = books
      .into_iter()
      .skip(skip)
      .take(query.page_size as usize)
      .cloned()
      .collect();
    Ok(Page::new(items, query.page, query.page_size, total))
  }

  async fn find_book(&self, id: Uuid) -> StoreResult<Option<Book>> {
    self.check_available()?;
    Ok(self.tables.lock().books.get(&id).cloned())
  }

  async fn find_books(&self, ids: &[Uuid]) -> StoreResult<Vec<Book>> {
    self.check_available()?;
    let tables = self.tables.lock();
    Ok(ids.iter().filter_map(|id| tables.books.get(id).cloned()).collect())
  }

  async fn insert_book(&self, book: &Book) -> StoreResult<()> {
    self.check_available()?;
    self.tables.lock().books.insert(book.id, book.clone());
    Ok(())
  }

  async fn update_book(&self, book: &Book) -> StoreResult<Option<Book>> {
    self.check_available()?;
    let mut tables = self.tables.lock();
    match tables.books.get_mut(&book.id) {
      Some(existing) => {
        *existing = book.clone();
        Ok(Some(book.clone()))
      }
      None => Ok(None),
    }
  }

  async fn claim_code_exists(&self, code: &str) -> StoreResult<bool> {
    self.check_available()?;
    if self.blind_claim_lookup.load(Ordering::SeqCst) {
      return Ok(false);
    }
    Ok(self.tables.lock().by_claim_code.contains_key(code))
  }

  async fn find_order_by_request_key(&self, customer_id: Uuid, request_key: &str) -> StoreResult<Option<OrderDetails>> {
    self.check_available()?;
    let missed = self
      .request_lookup_misses
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if missed {
      return Ok(None);
    }
    let tables = self.tables.lock();
    Ok(
      tables
        .by_request_key
        .get(&(customer_id, request_key.to_string()))
        .and_then(|id| tables.details(*id)),
    )
  }

  async fn insert_order(&self, details: &OrderDetails) -> StoreResult<()> {
    self.check_available()?;
    let order = &details.order;
    let mut tables = self.tables.lock();

    if let Some(key) = &order.request_key {
      if tables.by_request_key.contains_key(&(order.customer_id, key.clone())) {
        return Err(StoreError::DuplicateRequest);
      }
    }
    if tables.by_claim_code.contains_key(&order.claim_code) {
      return Err(StoreError::ClaimCodeTaken);
    }
    // Check every line before touching stock so a failure leaves nothing behind.
    for item in &details.order_items {
      let book = tables.books.get(&item.book_id).ok_or(StoreError::BookNotFound(item.book_id))?;
      if book.stock < item.quantity {
        return Err(StoreError::InsufficientStock {
          book_id: item.book_id,
          requested: i64::from(item.quantity),
          available: i64::from(book.stock),
        });
      }
    }
    let now = Utc::now();
    for item in &details.order_items {
      if let Some(book) = tables.books.get_mut(&item.book_id) {
        book.stock -= item.quantity;
        book.updated_at = now;
      }
    }

    tables.by_claim_code.insert(order.claim_code.clone(), order.id);
    if let Some(key) = &order.request_key {
      tables.by_request_key.insert((order.customer_id, key.clone()), order.id);
    }
    tables.orders.insert(order.id, order.clone());
    tables.items.insert(order.id, details.order_items.clone());
    Ok(())
  }

  async fn find_order(&self, id: Uuid) -> StoreResult<Option<OrderDetails>> {
    self.check_available()?;
    Ok(self.tables.lock().details(id))
  }

  async fn find_order_by_claim_code(&self, code: &str) -> StoreResult<Option<OrderDetails>> {
    self.check_available()?;
    let tables = self.tables.lock();
    Ok(tables.by_claim_code.get(code).and_then(|id| tables.details(*id)))
  }

  async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Page<OrderDetails>> {
    self.check_available()?;
    let tables = self.tables.lock();
    let mut orders: Vec<&Order> = tables
      .orders
      .values()
      .filter(|o| query.status.map_or(true, |s| o.status == s))
      .filter(|o| query.customer_id.map_or(true, |c| o.customer_id == c))
      .collect();
    orders.sort_by(|a, b| b.order_date.cmp(&a.order_date).then(a.id.cmp(&b.id)));
    let total = orders.len() as i64;
    let skip = usize::try_from(offset(query.page, query.page_size)).unwrap_or(usize::MAX);
    let items = orders
      .into_iter()
      .skip(skip)
      .take(query.page_size as usize)
      .filter_map(|o| tables.details(o.id))
      .collect();
    Ok(Page::new(items, query.page, query.page_size, total))
  }

  async fn transition_order(
    &self,
    id: Uuid,
    expected: OrderStatus,
    next: OrderStatus,
  ) -> StoreResult<TransitionOutcome> {
    self.check_available()?;
    let mut tables = self.tables.lock();
    let now = Utc::now();

    let current = match tables.orders.get(&id) {
      Some(order) => order.status,
      None => return Ok(TransitionOutcome::Missing),
    };
    if current != expected {
      return Ok(TransitionOutcome::Stale { current });
    }

    if expected == OrderStatus::Pending && next == OrderStatus::Cancelled {
      let lines: Vec<(Uuid, i32)> = tables
        .items
        .get(&id)
        .map(|items| items.iter().map(|i| (i.book_id, i.quantity)).collect())
        .unwrap_or_default();
      for (book_id, quantity) in lines {
        if let Some(book) = tables.books.get_mut(&book_id) {
          book.stock += quantity;
          book.updated_at = now;
        }
      }
    }
    if let Some(order) = tables.orders.get_mut(&id) {
      order.status = next;
      order.updated_at = now;
    }
    match tables.details(id) {
      Some(details) => Ok(TransitionOutcome::Applied(details)),
      None => Ok(TransitionOutcome::Missing),
    }
  }
}
