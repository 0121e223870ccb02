// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use bookshop::config::AppConfig;
use bookshop::db::{MemoryStore, Store};
use bookshop::models::{Book, CartLine, User, UserRole};
use bookshop::services::claim_code::{ClaimCodeSource, RandomClaimCodes};
use bookshop::services::notifier::{Notifier, OrderNotification};
use bookshop::{AppError, AppState};
use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

/// Records every confirmation it is asked to send; can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
  attempts: Mutex<Vec<OrderNotification>>,
  failing: AtomicBool,
}

impl RecordingNotifier {
  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn attempts(&self) -> Vec<OrderNotification> {
    self.attempts.lock().clone()
  }

  /// Polls until `count` deliveries were attempted or a second has passed.
  pub async fn wait_for(&self, count: usize) -> Vec<OrderNotification> {
    for _ in 0..100 {
      if self.attempts.lock().len() >= count {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    self.attempts()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn send_order_confirmation(&self, notification: &OrderNotification) -> Result<(), AppError> {
    self.attempts.lock().push(notification.clone());
    if self.failing.load(Ordering::SeqCst) {
      return Err(AppError::Notification("mail relay refused the message".to_string()));
    }
    Ok(())
  }
}

/// Hands out scripted codes in order and repeats the last one once the script runs out.
/// With an empty script it draws random codes.
pub struct ScriptedClaimCodes {
  script: Mutex<VecDeque<String>>,
  last: Mutex<Option<String>>,
  fallback: RandomClaimCodes,
}

impl ScriptedClaimCodes {
  pub fn new(codes: &[&str]) -> Self {
    Self {
      script: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
      last: Mutex::new(None),
      fallback: RandomClaimCodes::new(10),
    }
  }
}

impl ClaimCodeSource for ScriptedClaimCodes {
  fn next_code(&self) -> String {
    match self.script.lock().pop_front() {
      Some(code) => {
        *self.last.lock() = Some(code.clone());
        code
      }
      None => match self.last.lock().clone() {
        Some(code) => code,
        None => self.fallback.next_code(),
      },
    }
  }
}

pub struct TestApp {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub notifier: Arc<RecordingNotifier>,
  pub customer: User,
  pub other_customer: User,
  pub staff: User,
}

fn user(name: &str, role: UserRole) -> User {
  User {
    id: Uuid::new_v4(),
    full_name: name.to_string(),
    email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
    role,
    created_at: Utc::now(),
  }
}

pub fn book(title: &str, price_cents: i64, stock: i32) -> Book {
  let now = Utc::now();
  Book {
    id: Uuid::new_v4(),
    title: title.to_string(),
    author: "Test Author".to_string(),
    isbn: "9780000000000".to_string(),
    genre: "Fiction".to_string(),
    language: "English".to_string(),
    format: "Paperback".to_string(),
    publisher: String::new(),
    publication_date: None,
    description: None,
    photo_url: Some(format!("https://img.example.com/{}.jpg", title.to_lowercase().replace(' ', "-"))),
    price_cents,
    stock,
    on_sale: false,
    discount_percentage: None,
    discount_start: None,
    discount_end: None,
    created_at: now,
    updated_at: now,
  }
}

impl TestApp {
  pub async fn new() -> Self {
    Self::build(AppConfig::in_memory(), Arc::new(RandomClaimCodes::new(10))).await
  }

  pub async fn with_codes(codes: &[&str]) -> Self {
    Self::build(AppConfig::in_memory(), Arc::new(ScriptedClaimCodes::new(codes))).await
  }

  pub async fn build(config: AppConfig, claim_codes: Arc<dyn ClaimCodeSource>) -> Self {
    setup_tracing();
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::new(Arc::new(config), store.clone(), notifier.clone(), claim_codes);

    let customer = user("Casey Reader", UserRole::Customer);
    let other_customer = user("Robin Other", UserRole::Customer);
    let staff = user("Sam Counter", UserRole::Staff);
    for u in [&customer, &other_customer, &staff] {
      store.upsert_user(u).await.expect("seed user");
    }

    Self {
      state,
      store,
      notifier,
      customer,
      other_customer,
      staff,
    }
  }

  pub async fn add_book(&self, book: Book) -> Book {
    self.store.insert_book(&book).await.expect("seed book");
    book
  }

  pub fn stock_of(&self, book: &Book) -> i32 {
    self.store.book_stock(book.id).expect("book exists")
  }
}

pub fn line(book: &Book, quantity: i64) -> CartLine {
  CartLine::new(book.id, quantity)
}
