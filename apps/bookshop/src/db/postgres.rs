// apps/bookshop/src/db/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::{event, info, instrument, Level};
use uuid::Uuid;

use super::{offset, BookQuery, BookSort, OrderQuery, Page, Store, StoreError, StoreResult, TransitionOutcome};
use crate::models::{Book, Order, OrderDetails, OrderItem, OrderStatus, User};

const BOOK_COLUMNS: &str = "id, title, author, isbn, genre, language, format, publisher, publication_date, \
  description, photo_url, price_cents, stock, on_sale, discount_percentage, discount_start, discount_end, \
  created_at, updated_at";

const ORDER_COLUMNS: &str = "id, customer_id, customer_name, customer_email, claim_code, status, order_date, \
  subtotal_cents, discount_applied_cents, total_amount_cents, total_quantity, request_key, updated_at";

const ITEM_COLUMNS: &str =
  "id, order_id, line_no, book_id, quantity, unit_price_cents, book_title, book_author, book_photo_url";

const CLAIM_CODE_CONSTRAINT: &str = "orders_claim_code_key";
const REQUEST_KEY_CONSTRAINT: &str = "orders_customer_request_key";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str) -> StoreResult<Self> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    info!("Successfully connected to the database.");
    Ok(Self::new(pool))
  }

  pub async fn migrate(&self) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    info!("Database migrations applied.");
    Ok(())
  }

  async fn attach_items(&self, orders: Vec<Order>) -> StoreResult<Vec<OrderDetails>> {
    if orders.is_empty() {
      return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items: Vec<OrderItem> = sqlx::query_as(&format!(
      "SELECT {} FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, line_no",
      ITEM_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&self.pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
      grouped.entry(item.order_id).or_default().push(item);
    }
    Ok(
      orders
        .into_iter()
        .map(|order| {
          let order_items = grouped.remove(&order.id).unwrap_or_default();
          OrderDetails { order, order_items }
        })
        .collect(),
    )
  }

  async fn find_order_where(&self, predicate: &str, value: &str) -> StoreResult<Option<OrderDetails>> {
    let order: Option<Order> = sqlx::query_as(&format!("SELECT {} FROM orders WHERE {} = $1", ORDER_COLUMNS, predicate))
      .bind(value)
      .fetch_optional(&self.pool)
      .await?;
    match order {
      Some(order) => Ok(self.attach_items(vec![order]).await?.pop()),
      None => Ok(None),
    }
  }
}

/// Maps unique-constraint violations on `orders` to their domain meaning.
fn classify_insert_error(err: sqlx::Error) -> StoreError {
  if let sqlx::Error::Database(db_err) = &err {
    match db_err.constraint() {
      Some(CLAIM_CODE_CONSTRAINT) => return StoreError::ClaimCodeTaken,
      Some(REQUEST_KEY_CONSTRAINT) => return StoreError::DuplicateRequest,
      _ => {}
    }
  }
  StoreError::Database(err)
}

fn escape_like(term: &str) -> String {
  let mut escaped = String::with_capacity(term.len() + 2);
  escaped.push('%');
  for c in term.chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('%');
  escaped
}

fn push_sale_active(qb: &mut QueryBuilder<'_, Postgres>, now: DateTime<Utc>) {
  qb.push("(on_sale AND (discount_start IS NULL OR discount_start <= ")
    .push_bind(now)
    .push(") AND (discount_end IS NULL OR discount_end >= ")
    .push_bind(now)
    .push("))");
}

/// Same rounding as `pricing::effective_unit_price`.
fn push_effective_price(qb: &mut QueryBuilder<'_, Postgres>, now: DateTime<Utc>) {
  qb.push("(CASE WHEN ");
  push_sale_active(qb, now);
  qb.push(" THEN price_cents - (price_cents * COALESCE(discount_percentage, 0) + 50) / 100 ELSE price_cents END)");
}

fn push_book_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &BookQuery) {
  qb.push(" WHERE TRUE");
  if let Some(term) = q.search.as_deref() {
    let pattern = escape_like(term);
    qb.push(" AND (title ILIKE ")
      .push_bind(pattern.clone())
      .push(" OR author ILIKE ")
      .push_bind(pattern)
      .push(")");
  }
  if let Some(genre) = q.genre.as_deref() {
    qb.push(" AND lower(genre) = lower(").push_bind(genre.to_string()).push(")");
  }
  if let Some(author) = q.author.as_deref() {
    qb.push(" AND author ILIKE ").push_bind(escape_like(author));
  }
  if q.on_sale_only {
    qb.push(" AND ");
    push_sale_active(qb, q.now);
  }
}

fn push_order_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &OrderQuery) {
  qb.push(" WHERE TRUE");
  if let Some(status) = q.status {
    qb.push(" AND status = ").push_bind(status);
  }
  if let Some(customer_id) = q.customer_id {
    qb.push(" AND customer_id = ").push_bind(customer_id);
  }
}

#[async_trait]
impl Store for PgStore {
  async fn ping(&self) -> StoreResult<()> {
    sqlx::query("SELECT 1").execute(&self.pool).await?;
    Ok(())
  }

  async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
    let user = sqlx::query_as("SELECT id, full_name, email, role, created_at FROM users WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(user)
  }

  async fn upsert_user(&self, user: &User) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO users (id, full_name, email, role, created_at) VALUES ($1, $2, $3, $4, $5) \
       ON CONFLICT (id) DO UPDATE SET full_name = EXCLUDED.full_name, email = EXCLUDED.email, role = EXCLUDED.role",
    )
    .bind(user.id)
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(user.role)
    .bind(user.created_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  #[instrument(name = "PgStore::list_books", skip(self), err)]
  async fn list_books(&self, query: &BookQuery) -> StoreResult<Page<Book>> {
    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books");
    push_book_filters(&mut count_qb, query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM books", BOOK_COLUMNS));
    push_book_filters(&mut qb, query);
    qb.push(" ORDER BY ");
    match query.sort {
      BookSort::Title => {
        qb.push("lower(title) ASC");
      }
      BookSort::PriceAsc => {
        push_effective_price(&mut qb, query.now);
        qb.push(" ASC");
      }
      BookSort::PriceDesc => {
        push_effective_price(&mut qb, query.now);
        qb.push(" DESC");
      }
      BookSort::Newest => {
        qb.push("created_at DESC");
      }
    }
    qb.push(", id LIMIT ")
      .push_bind(i64::from(query.page_size))
      .push(" OFFSET ")
      .push_bind(offset(query.page, query.page_size));

    let books: Vec<Book> = qb.build_query_as().fetch_all(&self.pool).await?;
    Ok(Page::new(books, query.page, query.page_size, total))
  }

  async fn find_book(&self, id: Uuid) -> StoreResult<Option<Book>> {
    let book = sqlx::query_as(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(book)
  }

  async fn find_books(&self, ids: &[Uuid]) -> StoreResult<Vec<Book>> {
    let books = sqlx::query_as(&format!("SELECT {} FROM books WHERE id = ANY($1)", BOOK_COLUMNS))
      .bind(ids)
      .fetch_all(&self.pool)
      .await?;
    Ok(books)
  }

  async fn insert_book(&self, book: &Book) -> StoreResult<()> {
    sqlx::query(&format!(
      "INSERT INTO books ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
      BOOK_COLUMNS
    ))
    .bind(book.id)
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.isbn)
    .bind(&book.genre)
    .bind(&book.language)
    .bind(&book.format)
    .bind(&book.publisher)
    .bind(book.publication_date)
    .bind(&book.description)
    .bind(&book.photo_url)
    .bind(book.price_cents)
    .bind(book.stock)
    .bind(book.on_sale)
    .bind(book.discount_percentage)
    .bind(book.discount_start)
    .bind(book.discount_end)
    .bind(book.created_at)
    .bind(book.updated_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn update_book(&self, book: &Book) -> StoreResult<Option<Book>> {
    let updated = sqlx::query_as(&format!(
      "UPDATE books SET title = $2, author = $3, isbn = $4, genre = $5, language = $6, format = $7, \
       publisher = $8, publication_date = $9, description = $10, photo_url = $11, price_cents = $12, \
       stock = $13, on_sale = $14, discount_percentage = $15, discount_start = $16, discount_end = $17, \
       updated_at = $18 WHERE id = $1 RETURNING {}",
      BOOK_COLUMNS
    ))
    .bind(book.id)
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.isbn)
    .bind(&book.genre)
    .bind(&book.language)
    .bind(&book.format)
    .bind(&book.publisher)
    .bind(book.publication_date)
    .bind(&book.description)
    .bind(&book.photo_url)
    .bind(book.price_cents)
    .bind(book.stock)
    .bind(book.on_sale)
    .bind(book.discount_percentage)
    .bind(book.discount_start)
    .bind(book.discount_end)
    .bind(book.updated_at)
    .fetch_optional(&self.pool)
    .await?;
    Ok(updated)
  }

  async fn claim_code_exists(&self, code: &str) -> StoreResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM orders WHERE claim_code = $1)")
      .bind(code)
      .fetch_one(&self.pool)
      .await?;
    Ok(exists)
  }

  async fn find_order_by_request_key(&self, customer_id: Uuid, request_key: &str) -> StoreResult<Option<OrderDetails>> {
    let order: Option<Order> = sqlx::query_as(&format!(
      "SELECT {} FROM orders WHERE customer_id = $1 AND request_key = $2",
      ORDER_COLUMNS
    ))
    .bind(customer_id)
    .bind(request_key)
    .fetch_optional(&self.pool)
    .await?;
    match order {
      Some(order) => Ok(self.attach_items(vec![order]).await?.pop()),
      None => Ok(None),
    }
  }

  #[instrument(name = "PgStore::insert_order", skip(self, details), fields(order_id = %details.order.id), err)]
  async fn insert_order(&self, details: &OrderDetails) -> StoreResult<()> {
    let order = &details.order;
    let mut tx = self.pool.begin().await?;

    sqlx::query(&format!(
      "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
      ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(order.customer_id)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.claim_code)
    .bind(order.status)
    .bind(order.order_date)
    .bind(order.subtotal_cents)
    .bind(order.discount_applied_cents)
    .bind(order.total_amount_cents)
    .bind(order.total_quantity)
    .bind(&order.request_key)
    .bind(order.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(classify_insert_error)?;

    for item in &details.order_items {
      // The guard keeps stock from going negative under concurrent orders.
      let remaining: Option<i32> = sqlx::query_scalar(
        "UPDATE books SET stock = stock - $2, updated_at = now() WHERE id = $1 AND stock >= $2 RETURNING stock",
      )
      .bind(item.book_id)
      .bind(item.quantity)
      .fetch_optional(&mut *tx)
      .await?;

      if remaining.is_none() {
        let available: Option<i32> = sqlx::query_scalar("SELECT stock FROM books WHERE id = $1")
          .bind(item.book_id)
          .fetch_optional(&mut *tx)
          .await?;
        event!(Level::WARN, book_id = %item.book_id, requested = item.quantity, ?available, "Stock check failed; rolling back order.");
        // Dropping `tx` rolls everything back.
        return Err(match available {
          Some(available) => StoreError::InsufficientStock {
            book_id: item.book_id,
            requested: i64::from(item.quantity),
            available: i64::from(available),
          },
          None => StoreError::BookNotFound(item.book_id),
        });
      }

      sqlx::query(&format!(
        "INSERT INTO order_items ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        ITEM_COLUMNS
      ))
      .bind(item.id)
      .bind(item.order_id)
      .bind(item.line_no)
      .bind(item.book_id)
      .bind(item.quantity)
      .bind(item.unit_price_cents)
      .bind(&item.book_title)
      .bind(&item.book_author)
      .bind(&item.book_photo_url)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn find_order(&self, id: Uuid) -> StoreResult<Option<OrderDetails>> {
    let order: Option<Order> = sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    match order {
      Some(order) => Ok(self.attach_items(vec![order]).await?.pop()),
      None => Ok(None),
    }
  }

  async fn find_order_by_claim_code(&self, code: &str) -> StoreResult<Option<OrderDetails>> {
    self.find_order_where("claim_code", code).await
  }

  #[instrument(name = "PgStore::list_orders", skip(self), err)]
  async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Page<OrderDetails>> {
    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
    push_order_filters(&mut count_qb, query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
    push_order_filters(&mut qb, query);
    qb.push(" ORDER BY order_date DESC, id LIMIT ")
      .push_bind(i64::from(query.page_size))
      .push(" OFFSET ")
      .push_bind(offset(query.page, query.page_size));
    let orders: Vec<Order> = qb.build_query_as().fetch_all(&self.pool).await?;

    let details = self.attach_items(orders).await?;
    Ok(Page::new(details, query.page, query.page_size, total))
  }

  #[instrument(name = "PgStore::transition_order", skip(self), err)]
  async fn transition_order(
    &self,
    id: Uuid,
    expected: OrderStatus,
    next: OrderStatus,
  ) -> StoreResult<TransitionOutcome> {
    let mut tx = self.pool.begin().await?;

    let applied = sqlx::query("UPDATE orders SET status = $3, updated_at = now() WHERE id = $1 AND status = $2")
      .bind(id)
      .bind(expected)
      .bind(next)
      .execute(&mut *tx)
      .await?
      .rows_affected();

    if applied == 0 {
      let current: Option<OrderStatus> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
      tx.rollback().await?;
      return Ok(match current {
        Some(current) => TransitionOutcome::Stale { current },
        None => TransitionOutcome::Missing,
      });
    }

    if expected == OrderStatus::Pending && next == OrderStatus::Cancelled {
      sqlx::query(
        "UPDATE books b SET stock = b.stock + oi.quantity, updated_at = now() \
         FROM order_items oi WHERE oi.order_id = $1 AND b.id = oi.book_id",
      )
      .bind(id)
      .execute(&mut *tx)
      .await?;
    }
    tx.commit().await?;

    match self.find_order(id).await? {
      Some(details) => Ok(TransitionOutcome::Applied(details)),
      None => Ok(TransitionOutcome::Missing),
    }
  }
}
