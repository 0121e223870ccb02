// apps/bookshop/src/lib.rs

//! Bookshop order service: order placement with bulk pricing and claim codes, in-store
//! fulfillment by claim code, cancellation and staff status updates, plus catalog browsing.
//!
//! Every order workflow is a `bookshop_flow` pipeline registered on [`state::AppState`];
//! the HTTP layer in [`web`] only translates requests into service calls.

pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod web;

pub use crate::config::AppConfig;
pub use crate::errors::{AppError, OrderError, Result};
pub use crate::state::AppState;
