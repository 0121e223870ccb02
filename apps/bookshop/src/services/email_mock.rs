// apps/bookshop/src/services/email_mock.rs
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::errors::{AppError, Result as AppResult};
use crate::services::notifier::{Notifier, OrderNotification};
use crate::services::pricing::format_cents;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
  pub to: String,
  pub from: String,
  pub subject: String,
  pub body: String,
}

pub fn render_order_confirmation(from: &str, n: &OrderNotification) -> RenderedEmail {
  RenderedEmail {
    to: n.to_email.clone(),
    from: from.to_string(),
    subject: format!("Your bookshop order is ready to collect - claim code {}", n.claim_code),
    body: format!(
      "<p>Hi {},</p>\
       <p>Thank you for your order placed on {}.</p>\
       <ul><li>Total books: {}</li><li>Subtotal: {}</li><li>Discount: {}</li><li>Final amount: {}</li></ul>\
       <p>Show claim code <strong>{}</strong> at the counter to pick up your books.</p>",
      n.customer_name,
      n.order_date.format("%Y-%m-%d %H:%M UTC"),
      n.total_books,
      format_cents(n.subtotal_cents),
      format_cents(n.discount_cents),
      format_cents(n.final_amount_cents),
      n.claim_code,
    ),
  }
}

/// Stands in for the mail provider: renders the message, waits, and logs it.
#[derive(Debug, Clone)]
pub struct MockEmailNotifier {
  sender: String,
  latency: Duration,
}

impl MockEmailNotifier {
  pub fn new(sender: impl Into<String>) -> Self {
    Self {
      sender: sender.into(),
      latency: Duration::from_millis(20),
    }
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }
}

#[async_trait]
impl Notifier for MockEmailNotifier {
  async fn send_order_confirmation(&self, notification: &OrderNotification) -> AppResult<()> {
    let email = render_order_confirmation(&self.sender, notification);
    info!(to = %email.to, from = %email.from, subject = %email.subject, "Simulating sending email.");
    tokio::time::sleep(self.latency).await;

    if email.to.trim().is_empty() || !email.to.contains('@') {
      return Err(AppError::Notification(format!("Invalid recipient address '{}'", email.to)));
    }

    let message_id = format!("mock_email_{}", uuid::Uuid::new_v4());
    info!(%message_id, "Mock email sent successfully.");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;

  fn notification(to: &str) -> OrderNotification {
    OrderNotification {
      to_email: to.into(),
      customer_name: "Ada".into(),
      order_id: uuid::Uuid::new_v4(),
      claim_code: "ABCD2345XY".into(),
      order_date: Utc::now(),
      total_books: 6,
      subtotal_cents: 4500,
      discount_cents: 225,
      final_amount_cents: 4275,
    }
  }

  #[test]
  fn rendered_email_carries_the_order_summary() {
    let email = render_order_confirmation("noreply@bookshop.local", &notification("ada@example.com"));
    assert!(email.subject.contains("ABCD2345XY"));
    for part in ["Total books: 6", "Subtotal: 45.00", "Discount: 2.25", "Final amount: 42.75"] {
      assert!(email.body.contains(part), "missing '{}'", part);
    }
  }

  #[tokio::test]
  async fn rejects_unusable_recipient() {
    let notifier = MockEmailNotifier::new("noreply@bookshop.local").with_latency(Duration::ZERO);
    assert!(notifier.send_order_confirmation(&notification("ada@example.com")).await.is_ok());
    assert!(matches!(
      notifier.send_order_confirmation(&notification("nobody")).await,
      Err(AppError::Notification(_))
    ));
  }
}
