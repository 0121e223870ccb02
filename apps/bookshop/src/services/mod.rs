// apps/bookshop/src/services/mod.rs

//! Business rules and collaborators used by the pipelines, plus the service entry points
//! the HTTP layer calls.

pub mod catalog_service;
pub mod claim_code;
pub mod email_mock;
pub mod notifier;
pub mod order_lifecycle;
pub mod order_service;
pub mod pricing;
