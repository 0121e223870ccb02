// tests/order_creation_tests.rs
mod common;

use bookshop::db::StoreError;
use bookshop::models::{CartLine, OrderStatus};
use bookshop::services::claim_code::CLAIM_CODE_ALPHABET;
use bookshop::services::order_service::create_order;
use bookshop::services::pricing::percent_of;
use bookshop::{AppError, OrderError};
use common::*;
use std::collections::HashSet;

#[tokio::test]
async fn storefront_example_totals_42_75() {
  let app = TestApp::new().await;
  let a = app.add_book(book("Ten Dollar Book", 1000, 10)).await;
  let b = app.add_book(book("Five Dollar Book", 500, 10)).await;

  let placed = create_order(&app.state, app.customer.id, vec![line(&a, 3), line(&b, 3)], None)
    .await
    .unwrap();
  let order = &placed.order.order;

  assert!(!placed.replayed);
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(order.subtotal_cents, 4500);
  assert_eq!(order.discount_applied_cents, 225);
  assert_eq!(order.total_amount_cents, 4275);
  assert_eq!(order.total_quantity, 6);
  assert_eq!(order.customer_name, app.customer.full_name);
  assert_eq!(order.customer_email, app.customer.email);
  assert_eq!(order.claim_code.len(), 10);
  assert!(order.claim_code.bytes().all(|c| CLAIM_CODE_ALPHABET.contains(&c)));

  let items = &placed.order.order_items;
  assert_eq!(items.len(), 2);
  assert_eq!(items[0].book_id, a.id);
  assert_eq!(items[0].unit_price_cents, 1000);
  assert_eq!(items[0].book_title, "Ten Dollar Book");
  assert_eq!(items[1].unit_price_cents, 500);
  let line_sum: i64 = items.iter().filter_map(|i| i.line_total_cents()).sum();
  assert_eq!(line_sum - order.discount_applied_cents, order.total_amount_cents);

  assert_eq!(app.stock_of(&a), 7);
  assert_eq!(app.stock_of(&b), 7);

  let sent = app.notifier.wait_for(1).await;
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].claim_code, order.claim_code);
  assert_eq!(sent[0].total_books, 6);
  assert_eq!(sent[0].subtotal_cents, 4500);
  assert_eq!(sent[0].discount_cents, 225);
  assert_eq!(sent[0].final_amount_cents, 4275);
}

#[tokio::test]
async fn bulk_discount_applies_from_five_units() {
  let app = TestApp::new().await;
  let cheap = app.add_book(book("Cheap", 333, 1000)).await;
  let pricey = app.add_book(book("Pricey", 2199, 1000)).await;

  for (q1, q2) in [(1, 0), (2, 2), (4, 0), (3, 1), (5, 0), (2, 3), (1, 9), (7, 7)] {
    let mut lines = vec![line(&cheap, q1)];
    if q2 > 0 {
      lines.push(line(&pricey, q2));
    }
    let placed = create_order(&app.state, app.customer.id, lines, None).await.unwrap();
    let order = placed.order.order;
    let subtotal = 333 * q1 + 2199 * q2;
    assert_eq!(order.subtotal_cents, subtotal);
    if q1 + q2 >= 5 {
      assert_eq!(order.discount_applied_cents, percent_of(subtotal, 5), "{} + {} units", q1, q2);
    } else {
      assert_eq!(order.discount_applied_cents, 0, "{} + {} units", q1, q2);
    }
    assert_eq!(order.total_amount_cents, subtotal - order.discount_applied_cents);
  }
}

#[tokio::test]
async fn insufficient_stock_persists_nothing() {
  let app = TestApp::new().await;
  let plenty = app.add_book(book("Plenty", 1000, 50)).await;
  let scarce = app.add_book(book("Scarce", 1000, 2)).await;

  let err = create_order(
    &app.state,
    app.customer.id,
    vec![line(&plenty, 4), line(&scarce, 3)],
    None,
  )
  .await
  .unwrap_err();

  assert!(matches!(
    err,
    AppError::Order(OrderError::InsufficientStock { book_id, requested: 3, available: 2 }) if book_id == scarce.id
  ));
  assert_eq!(app.store.order_count(), 0);
  assert_eq!(app.stock_of(&plenty), 50);
  assert_eq!(app.stock_of(&scarce), 2);
  assert!(app.notifier.attempts().is_empty());
}

#[tokio::test]
async fn rejects_bad_carts_before_persisting() {
  let app = TestApp::new().await;
  let b = app.add_book(book("Any", 1000, 5)).await;

  let err = create_order(&app.state, app.customer.id, vec![], None).await.unwrap_err();
  assert!(matches!(err, AppError::Order(OrderError::EmptyCart)));

  let err = create_order(&app.state, app.customer.id, vec![line(&b, 0)], None)
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::Order(OrderError::InvalidQuantity { quantity: 0, .. })));

  let err = create_order(&app.state, app.customer.id, vec![line(&b, -2)], None)
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::Order(OrderError::InvalidQuantity { quantity: -2, .. })));

  let ghost = book("Not In Catalog", 1000, 5);
  let err = create_order(&app.state, app.customer.id, vec![line(&ghost, 1)], None)
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::Order(OrderError::BookNotFound(id)) if id == ghost.id));

  assert_eq!(app.store.order_count(), 0);
  assert_eq!(app.stock_of(&b), 5);
}

#[tokio::test]
async fn duplicate_lines_are_merged_before_the_stock_check() {
  let app = TestApp::new().await;
  let b = app.add_book(book("Popular", 1000, 4)).await;

  let err = create_order(&app.state, app.customer.id, vec![line(&b, 2), line(&b, 3)], None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    AppError::Order(OrderError::InsufficientStock { requested: 5, available: 4, .. })
  ));

  let restocked = app.add_book(book("Restocked", 1000, 10)).await;
  let placed = create_order(
    &app.state,
    app.customer.id,
    vec![line(&restocked, 2), line(&restocked, 3)],
    None,
  )
  .await
  .unwrap();
  assert_eq!(placed.order.order_items.len(), 1);
  assert_eq!(placed.order.order_items[0].quantity, 5);
  assert_eq!(placed.order.order.discount_applied_cents, 250);
  assert_eq!(app.stock_of(&restocked), 5);
}

#[tokio::test]
async fn prices_come_from_the_catalog_and_active_sales() {
  let app = TestApp::new().await;
  let mut sale = book("On Sale", 2000, 10);
  sale.on_sale = true;
  sale.discount_percentage = Some(25);
  let sale = app.add_book(sale).await;

  let mut expired = book("Sale Over", 2000, 10);
  expired.on_sale = true;
  expired.discount_percentage = Some(50);
  expired.discount_end = Some(chrono::Utc::now() - chrono::Duration::days(1));
  let expired = app.add_book(expired).await;

  let mut cheeky = CartLine::new(sale.id, 1);
  cheeky.unit_price = Some(0.01);

  let placed = create_order(&app.state, app.customer.id, vec![cheeky, line(&expired, 1)], None)
    .await
    .unwrap();
  let items = &placed.order.order_items;
  assert_eq!(items[0].unit_price_cents, 1500);
  assert_eq!(items[1].unit_price_cents, 2000);
  assert_eq!(placed.order.order.total_amount_cents, 3500);
}

#[tokio::test]
async fn ten_thousand_orders_get_distinct_claim_codes() {
  let app = TestApp::new().await;
  let b = app.add_book(book("Bestseller", 100, 10_000)).await;

  let mut codes = HashSet::with_capacity(10_000);
  for _ in 0..10_000 {
    let placed = create_order(&app.state, app.customer.id, vec![line(&b, 1)], None)
      .await
      .unwrap();
    codes.insert(placed.order.order.claim_code);
  }
  assert_eq!(codes.len(), 10_000);
  assert_eq!(app.stock_of(&b), 0);
}

#[tokio::test]
async fn request_key_replays_the_original_order() {
  let app = TestApp::new().await;
  let b = app.add_book(book("Retry Me", 1000, 10)).await;

  let first = create_order(&app.state, app.customer.id, vec![line(&b, 2)], Some("cart-42".into()))
    .await
    .unwrap();
  let again = create_order(&app.state, app.customer.id, vec![line(&b, 2)], Some(" cart-42 ".into()))
    .await
    .unwrap();

  assert!(!first.replayed);
  assert!(again.replayed);
  assert_eq!(again.order.id(), first.order.id());
  assert_eq!(again.order.order.claim_code, first.order.order.claim_code);
  assert_eq!(app.stock_of(&b), 8);
  assert_eq!(app.store.order_count(), 1);

  // Same key from another customer is a different request.
  let theirs = create_order(&app.state, app.other_customer.id, vec![line(&b, 1)], Some("cart-42".into()))
    .await
    .unwrap();
  assert!(!theirs.replayed);
  assert_ne!(theirs.order.id(), first.order.id());

  assert_eq!(app.notifier.wait_for(2).await.len(), 2);
}

#[tokio::test]
async fn request_key_committed_by_a_concurrent_submission_returns_the_winner() {
  let app = TestApp::new().await;
  let b = app.add_book(book("Raced", 1000, 10)).await;

  let winner = create_order(&app.state, app.customer.id, vec![line(&b, 2)], Some("cart-7".into()))
    .await
    .unwrap();
  // The second submission looks before the first has committed, then loses at insert.
  app.store.miss_next_request_lookups(1);
  let loser = create_order(&app.state, app.customer.id, vec![line(&b, 2)], Some("cart-7".into()))
    .await
    .unwrap();

  assert!(loser.replayed);
  assert_eq!(loser.order.id(), winner.order.id());
  assert_eq!(app.stock_of(&b), 8);
  assert_eq!(app.store.order_count(), 1);
  assert_eq!(app.notifier.wait_for(1).await.len(), 1);
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;
  assert_eq!(app.notifier.attempts().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_with_one_key_create_one_order() {
  let app = TestApp::new().await;
  let b = app.add_book(book("Double Click", 1000, 100)).await;

  let mut tasks = Vec::new();
  for _ in 0..16 {
    let state = app.state.clone();
    let customer_id = app.customer.id;
    let lines = vec![line(&b, 1)];
    tasks.push(tokio::spawn(async move {
      create_order(&state, customer_id, lines, Some("k1".into())).await
    }));
  }

  let mut ids = HashSet::new();
  let mut fresh = 0;
  for task in tasks {
    let placed = task.await.unwrap().unwrap();
    if !placed.replayed {
      fresh += 1;
    }
    ids.insert(placed.order.id());
  }
  assert_eq!(ids.len(), 1);
  assert_eq!(fresh, 1);
  assert_eq!(app.stock_of(&b), 99);
  assert_eq!(app.store.order_count(), 1);
}

#[tokio::test]
async fn order_total_overflow_is_rejected_without_side_effects() {
  let app = TestApp::new().await;
  let pricey = app.add_book(book("Priceless", 1_000_000_000_000_000_000, 10)).await;

  let err = create_order(&app.state, app.customer.id, vec![line(&pricey, 5)], None)
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::Order(OrderError::AmountTooLarge)));
  assert_eq!(app.stock_of(&pricey), 10);
  assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn taken_claim_code_is_redrawn_before_insert() {
  let app = TestApp::with_codes(&["TAKENCODE2", "TAKENCODE2", "FRESHCODE3"]).await;
  let b = app.add_book(book("Any", 1000, 10)).await;

  let first = create_order(&app.state, app.customer.id, vec![line(&b, 1)], None)
    .await
    .unwrap();
  let second = create_order(&app.state, app.customer.id, vec![line(&b, 1)], None)
    .await
    .unwrap();
  assert_eq!(first.order.order.claim_code, "TAKENCODE2");
  assert_eq!(second.order.order.claim_code, "FRESHCODE3");
}

#[tokio::test]
async fn claim_code_taken_at_insert_is_retried() {
  let app = TestApp::with_codes(&["RACEDCODE4", "RACEDCODE4", "WINNERCD56"]).await;
  let b = app.add_book(book("Any", 1000, 10)).await;
  create_order(&app.state, app.customer.id, vec![line(&b, 1)], None)
    .await
    .unwrap();

  // The pre-insert lookup misses, as it would when another order takes the code in between.
  app.store.set_blind_claim_lookup(true);
  let second = create_order(&app.state, app.customer.id, vec![line(&b, 2)], None)
    .await
    .unwrap();
  assert_eq!(second.order.order.claim_code, "WINNERCD56");
  assert_eq!(app.store.order_count(), 2);
  assert_eq!(app.stock_of(&b), 7);
}

#[tokio::test]
async fn gives_up_when_no_unused_code_turns_up() {
  let app = TestApp::with_codes(&["STUCKCODE7"]).await;
  let b = app.add_book(book("Any", 1000, 10)).await;
  create_order(&app.state, app.customer.id, vec![line(&b, 1)], None)
    .await
    .unwrap();

  let err = create_order(&app.state, app.customer.id, vec![line(&b, 1)], None)
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::Internal(_)));
  assert_eq!(app.store.order_count(), 1);
  assert_eq!(app.stock_of(&b), 9);
}

#[tokio::test]
async fn notification_failure_keeps_the_order() {
  let app = TestApp::new().await;
  app.notifier.set_failing(true);
  let b = app.add_book(book("Any", 1000, 10)).await;

  let placed = create_order(&app.state, app.customer.id, vec![line(&b, 1)], None)
    .await
    .unwrap();

  assert_eq!(app.notifier.wait_for(1).await.len(), 1);
  let stored = app.state.store.find_order(placed.order.id()).await.unwrap();
  assert_eq!(stored.map(|o| o.status()), Some(OrderStatus::Pending));
  assert_eq!(app.stock_of(&b), 9);
}

#[tokio::test]
async fn store_outage_surfaces_as_unavailable() {
  let app = TestApp::new().await;
  let b = app.add_book(book("Any", 1000, 10)).await;
  app.store.set_unavailable(true);

  let err = create_order(&app.state, app.customer.id, vec![line(&b, 1)], None)
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
}
