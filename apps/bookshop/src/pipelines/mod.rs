// apps/bookshop/src/pipelines/mod.rs

//! Defines and registers the order workflows.

use crate::errors::AppError;
use bookshop_flow::Registry;
use std::sync::Arc;

pub mod common_steps;
pub mod contexts;

pub mod cancel_order_pipeline;
pub mod place_order_pipeline;
pub mod redeem_claim_pipeline;
pub mod status_update_pipeline;

/// Registers every workflow with the registry. Called once from `AppState::new`.
pub fn register_all_pipelines(registry: &Arc<Registry<AppError>>) {
  tracing::info!("Registering order pipelines...");

  place_order_pipeline::register_place_order_pipeline(registry);
  redeem_claim_pipeline::register_redeem_claim_pipeline(registry);
  cancel_order_pipeline::register_cancel_order_pipeline(registry);
  status_update_pipeline::register_status_update_pipeline(registry);

  tracing::info!("All order pipelines registered.");
}
