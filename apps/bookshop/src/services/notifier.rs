// apps/bookshop/src/services/notifier.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::OrderDetails;

/// Everything an order confirmation needs; built from the persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotification {
  pub to_email: String,
  pub customer_name: String,
  pub order_id: Uuid,
  pub claim_code: String,
  pub order_date: DateTime<Utc>,
  pub total_books: i64,
  pub subtotal_cents: i64,
  pub discount_cents: i64,
  pub final_amount_cents: i64,
}

impl OrderNotification {
  pub fn for_order(details: &OrderDetails) -> Self {
    let order = &details.order;
    Self {
      to_email: order.customer_email.clone(),
      customer_name: order.customer_name.clone(),
      order_id: order.id,
      claim_code: order.claim_code.clone(),
      order_date: order.order_date,
      total_books: i64::from(order.total_quantity),
      subtotal_cents: order.subtotal_cents,
      discount_cents: order.discount_applied_cents,
      final_amount_cents: order.total_amount_cents,
    }
  }
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send_order_confirmation(&self, notification: &OrderNotification) -> Result<(), AppError>;
}

/// Sends the confirmation in the background. Failures are logged and go no further.
pub fn dispatch_order_confirmation(
  notifier: Arc<dyn Notifier>,
  notification: OrderNotification,
) -> tokio::task::JoinHandle<()> {
  let span = tracing::info_span!("notify::order_confirmation", order_id = %notification.order_id);
  tokio::spawn(
    async move {
      match notifier.send_order_confirmation(&notification).await {
        Ok(()) => info!(to = %notification.to_email, "Order confirmation delivered."),
        Err(e) => warn!(to = %notification.to_email, error = %e, "Order confirmation could not be delivered."),
      }
    }
    .instrument(span),
  )
}
