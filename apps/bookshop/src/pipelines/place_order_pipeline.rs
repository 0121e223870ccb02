// apps/bookshop/src/pipelines/place_order_pipeline.rs

//! Order Aggregator: turns a cart into a persisted, priced order with a claim code.

use crate::db::StoreError;
use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, OrderDetails, OrderItem, OrderStatus};
use crate::pipelines::contexts::PlaceOrderCtxData;
use crate::services::claim_code::log_prefix;
use crate::services::notifier::{dispatch_order_confirmation, OrderNotification};
use crate::services::pricing;
use crate::state::AppState;
use bookshop_flow::{ContextData, Pipeline, PipelineControl, Registry, SkipCondition};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, info, instrument, warn, Level};
use uuid::Uuid;

type Ctx = ContextData<PlaceOrderCtxData>;

pub fn register_place_order_pipeline(registry: &Arc<Registry<AppError>>) {
  let skip_when_replayed: SkipCondition<PlaceOrderCtxData> = Arc::new(|ctx: Ctx| {
    let replayed = ctx.read().replayed;
    replayed
  });

  let mut p = Pipeline::<PlaceOrderCtxData, AppError>::new(&[
    ("check_replayed_request", false, None),
    ("validate_cart", false, None),
    ("load_customer", false, None),
    ("price_lines", false, None),
    ("apply_bulk_discount", false, None),
    ("issue_claim_code", false, None),
    ("persist_order", false, None),
    ("dispatch_confirmation", true, Some(skip_when_replayed)),
  ]);

  p.on_root("check_replayed_request", check_replayed_request);
  p.on_root("validate_cart", validate_cart);
  p.on_root("load_customer", load_customer);
  p.on_root("price_lines", price_lines);
  p.on_root("apply_bulk_discount", apply_bulk_discount);
  p.on_root("issue_claim_code", issue_claim_code);
  p.on_root("persist_order", persist_order);
  p.on_root("dispatch_confirmation", dispatch_confirmation);

  registry.register_pipeline(p);
}

/// A resubmitted request key returns the order it already created and ends the run.
#[instrument(name = "place_order::check_replayed_request", skip(ctx), err)]
async fn check_replayed_request(ctx: Ctx) -> AppResult<PipelineControl> {
  let (store, customer_id, request_key) = {
    let guard = ctx.read();
    (guard.app_state.store.clone(), guard.customer_id, guard.request_key.clone())
  };
  let Some(key) = request_key else {
    return Ok(PipelineControl::Continue);
  };

  match store.find_order_by_request_key(customer_id, &key).await? {
    Some(existing) => {
      info!(order_id = %existing.id(), %customer_id, "Request key already used; returning the original order.");
      let mut guard = ctx.write();
      guard.order = Some(existing);
      guard.replayed = true;
      Ok(PipelineControl::Stop)
    }
    None => Ok(PipelineControl::Continue),
  }
}

#[instrument(name = "place_order::validate_cart", skip(ctx), err)]
async fn validate_cart(ctx: Ctx) -> AppResult<PipelineControl> {
  let mut guard = ctx.write();
  let merged = pricing::merge_lines(&guard.lines)?;
  event!(Level::DEBUG, lines = guard.lines.len(), distinct_books = merged.len(), "Cart validated.");
  guard.merged = merged;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "place_order::load_customer", skip(ctx), err)]
async fn load_customer(ctx: Ctx) -> AppResult<PipelineControl> {
  let (store, customer_id) = {
    let guard = ctx.read();
    (guard.app_state.store.clone(), guard.customer_id)
  };
  let customer = store
    .find_user(customer_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Customer {} was not found.", customer_id)))?;
  ctx.write().customer = Some(customer);
  Ok(PipelineControl::Continue)
}

/// Unit prices come from the catalog as of now; client-sent prices are never used.
#[instrument(name = "place_order::price_lines", skip(ctx), err)]
async fn price_lines(ctx: Ctx) -> AppResult<PipelineControl> {
  let (store, merged) = {
    let guard = ctx.read();
    (guard.app_state.store.clone(), guard.merged.clone())
  };
  let ids: Vec<Uuid> = merged.iter().map(|(id, _)| *id).collect();
  let books: HashMap<Uuid, _> = store.find_books(&ids).await?.into_iter().map(|b| (b.id, b)).collect();

  let priced = pricing::price_lines(&merged, &books, Utc::now())?;
  ctx.write().priced = priced;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "place_order::apply_bulk_discount", skip(ctx), err)]
async fn apply_bulk_discount(ctx: Ctx) -> AppResult<PipelineControl> {
  let mut guard = ctx.write();
  let totals = pricing::totals(&guard.priced, &guard.app_state.bulk_rule())?;
  event!(
    Level::DEBUG,
    subtotal_cents = totals.subtotal_cents,
    discount_cents = totals.discount_cents,
    total_quantity = totals.total_quantity,
    "Order totals computed."
  );
  guard.totals = totals;
  Ok(PipelineControl::Continue)
}

/// Draws codes until one is not yet in the store.
#[instrument(name = "place_order::issue_claim_code", skip(ctx), err)]
async fn issue_claim_code(ctx: Ctx) -> AppResult<PipelineControl> {
  let state = ctx.read().app_state.clone();
  let code = fresh_claim_code(&state).await?;
  ctx.write().claim_code = Some(code);
  Ok(PipelineControl::Continue)
}

async fn fresh_claim_code(state: &AppState) -> AppResult<String> {
  for attempt in 1..=state.config.claim_code_attempts {
    let candidate = state.claim_codes.next_code();
    if !state.store.claim_code_exists(&candidate).await? {
      return Ok(candidate);
    }
    warn!(attempt, code_prefix = log_prefix(&candidate), "Claim code collision; drawing another.");
  }
  Err(AppError::Internal(format!(
    "no unused claim code after {} attempts",
    state.config.claim_code_attempts
  )))
}

fn build_order(data: &PlaceOrderCtxData, claim_code: String) -> AppResult<OrderDetails> {
  let customer = data
    .customer
    .as_ref()
    .ok_or_else(|| AppError::Internal("customer not loaded before persisting".to_string()))?;
  let total_quantity = i32::try_from(data.totals.total_quantity)
    .map_err(|_| AppError::Validation("Order quantity is too large.".to_string()))?;
  let now = Utc::now();
  let order_id = Uuid::new_v4();

  let order_items = data
    .priced
    .iter()
    .zip(1..)
    .map(|(line, line_no)| OrderItem {
      id: Uuid::new_v4(),
      order_id,
      line_no,
      book_id: line.book_id,
      quantity: line.quantity,
      unit_price_cents: line.unit_price_cents,
      book_title: line.title.clone(),
      book_author: line.author.clone(),
      book_photo_url: line.photo_url.clone(),
    })
    .collect();

  Ok(OrderDetails {
    order: Order {
      id: order_id,
      customer_id: customer.id,
      customer_name: customer.full_name.clone(),
      customer_email: customer.email.clone(),
      claim_code,
      status: OrderStatus::Pending,
      order_date: now,
      subtotal_cents: data.totals.subtotal_cents,
      discount_applied_cents: data.totals.discount_cents,
      total_amount_cents: data.totals.total_cents,
      total_quantity,
      request_key: data.request_key.clone(),
      updated_at: now,
    },
    order_items,
  })
}

/// Writes order, items and stock decrement in one store transaction. A claim code taken
/// in the meantime is replaced and the write retried; a request key taken in the
/// meantime means a concurrent submission won, and its order is returned instead.
#[instrument(name = "place_order::persist_order", skip(ctx), err)]
async fn persist_order(ctx: Ctx) -> AppResult<PipelineControl> {
  let (state, mut details) = {
    let guard = ctx.read();
    let code = guard
      .claim_code
      .clone()
      .ok_or_else(|| AppError::Internal("claim code not issued before persisting".to_string()))?;
    (guard.app_state.clone(), build_order(&guard, code)?)
  };

  let mut attempt = 1;
  loop {
    match state.store.insert_order(&details).await {
      Ok(()) => {
        info!(
          order_id = %details.id(),
          customer_id = %details.order.customer_id,
          code_prefix = log_prefix(&details.order.claim_code),
          total_cents = details.order.total_amount_cents,
          "Order placed."
        );
        let mut guard = ctx.write();
        guard.claim_code = Some(details.order.claim_code.clone());
        guard.order = Some(details);
        return Ok(PipelineControl::Continue);
      }
      Err(StoreError::ClaimCodeTaken) if attempt < state.config.claim_code_attempts => {
        attempt += 1;
        warn!(attempt, "Claim code taken at insert; retrying with a new one.");
        details.order.claim_code = fresh_claim_code(&state).await?;
      }
      Err(StoreError::ClaimCodeTaken) => {
        return Err(AppError::Internal(format!(
          "claim code still taken after {} attempts",
          attempt
        )));
      }
      Err(StoreError::DuplicateRequest) => {
        let key = details.order.request_key.clone().unwrap_or_default();
        let existing = state
          .store
          .find_order_by_request_key(details.order.customer_id, &key)
          .await?
          .ok_or_else(|| AppError::Internal("request key conflict without an order".to_string()))?;
        info!(order_id = %existing.id(), "Concurrent submission with the same request key won.");
        let mut guard = ctx.write();
        guard.order = Some(existing);
        guard.replayed = true;
        return Ok(PipelineControl::Stop);
      }
      Err(other) => return Err(other.into()),
    }
  }
}

/// Fire-and-forget: delivery runs on its own task and its failures are only logged.
#[instrument(name = "place_order::dispatch_confirmation", skip(ctx), err)]
async fn dispatch_confirmation(ctx: Ctx) -> AppResult<PipelineControl> {
  let guard = ctx.read();
  let Some(order) = guard.order.as_ref() else {
    return Err(AppError::Internal("no order to confirm".to_string()));
  };
  let notification = OrderNotification::for_order(order);
  drop(dispatch_order_confirmation(guard.app_state.notifier.clone(), notification));
  Ok(PipelineControl::Continue)
}
