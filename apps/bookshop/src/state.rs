// apps/bookshop/src/state.rs
use crate::config::AppConfig;
use crate::db::Store;
use crate::errors::AppError;
use crate::pipelines;
use crate::services::claim_code::{ClaimCodeSource, RandomClaimCodes};
use crate::services::email_mock::MockEmailNotifier;
use crate::services::notifier::Notifier;
use crate::services::pricing::BulkDiscountRule;
use bookshop_flow::Registry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub flows: Arc<Registry<AppError>>,
  pub config: Arc<AppConfig>,
  pub notifier: Arc<dyn Notifier>,
  pub claim_codes: Arc<dyn ClaimCodeSource>,
}

impl AppState {
  /// Wires the collaborators together and registers every order workflow.
  pub fn new(
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    claim_codes: Arc<dyn ClaimCodeSource>,
  ) -> Self {
    let state = Self {
      store,
      flows: Arc::new(Registry::new()),
      config,
      notifier,
      claim_codes,
    };
    pipelines::register_all_pipelines(&state.flows);
    state
  }

  /// Production collaborators: the mock mailer and OS-random claim codes.
  pub fn with_defaults(config: Arc<AppConfig>, store: Arc<dyn Store>) -> Self {
    let notifier = Arc::new(MockEmailNotifier::new(config.email_sender.clone()));
    let claim_codes = Arc::new(RandomClaimCodes::new(config.claim_code_length));
    Self::new(config, store, notifier, claim_codes)
  }

  pub fn bulk_rule(&self) -> BulkDiscountRule {
    BulkDiscountRule {
      threshold_units: self.config.bulk_discount_threshold,
      percent: self.config.bulk_discount_percent,
    }
  }
}
