// apps/bookshop/src/db/seed.rs

//! Demo data for local runs (`SEED_DB=true`). Safe to run on every start.

use chrono::{Duration, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use super::{Store, StoreResult};
use crate::models::{Book, User, UserRole};

pub const DEMO_CUSTOMER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);
pub const DEMO_STAFF_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0002);
pub const DEMO_ADMIN_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0003);

fn demo_users() -> Vec<User> {
  let now = Utc::now();
  [
    (DEMO_CUSTOMER_ID, "Casey Reader", "casey@bookshop.local", UserRole::Customer),
    (DEMO_STAFF_ID, "Sam Counter", "sam@bookshop.local", UserRole::Staff),
    (DEMO_ADMIN_ID, "Alex Admin", "alex@bookshop.local", UserRole::Admin),
  ]
  .into_iter()
  .map(|(id, name, email, role)| User {
    id,
    full_name: name.to_string(),
    email: email.to_string(),
    role,
    created_at: now,
  })
  .collect()
}

fn demo_books() -> Vec<Book> {
  let now = Utc::now();
  let entry = |n: u128, title: &str, author: &str, isbn: &str, genre: &str, price_cents: i64, stock: i32| Book {
    id: Uuid::from_u128(0x0000_0000_0000_4000_9000_0000_0000_0000 + n),
    title: title.to_string(),
    author: author.to_string(),
    isbn: isbn.to_string(),
    genre: genre.to_string(),
    language: "English".to_string(),
    format: "Paperback".to_string(),
    publisher: String::new(),
    publication_date: None,
    description: None,
    photo_url: None,
    price_cents,
    stock,
    on_sale: false,
    discount_percentage: None,
    discount_start: None,
    discount_end: None,
    created_at: now,
    updated_at: now,
  };

  let mut dune = entry(1, "Dune", "Frank Herbert", "9780441172719", "Science Fiction", 1899, 12);
  dune.publication_date = NaiveDate::from_ymd_opt(1965, 8, 1);

  let mut hobbit = entry(2, "The Hobbit", "J.R.R. Tolkien", "9780547928227", "Fantasy", 1450, 8);
  hobbit.on_sale = true;
  hobbit.discount_percentage = Some(20);
  hobbit.discount_start = Some(now - Duration::days(1));
  hobbit.discount_end = Some(now + Duration::days(30));

  vec![
    dune,
    hobbit,
    entry(3, "Pride and Prejudice", "Jane Austen", "9780141439518", "Classics", 999, 20),
    entry(4, "The Left Hand of Darkness", "Ursula K. Le Guin", "9780441478125", "Science Fiction", 1600, 5),
    entry(5, "Beloved", "Toni Morrison", "9781400033416", "Literary Fiction", 1700, 3),
  ]
}

/// Upserts the demo users and inserts any demo book not yet in the catalog.
pub async fn seed(store: &dyn Store) -> StoreResult<()> {
  for user in demo_users() {
    store.upsert_user(&user).await?;
  }
  let mut inserted = 0usize;
  for book in demo_books() {
    if store.find_book(book.id).await?.is_none() {
      store.insert_book(&book).await?;
      inserted += 1;
    }
  }
  info!(books_inserted = inserted, "Demo data seeded.");
  Ok(())
}
