// src/lib.rs

//! bookshop-flow: asynchronous step pipelines for the bookshop's order workflows.
//!
//! A workflow is a [`Pipeline`] over one context type. It is an ordered list of named
//! steps; every step runs its `before`, `on` and `after` handlers in that order. Handlers
//! share the context through [`ContextData`] and may halt the run early with
//! [`PipelineControl::Stop`]. Steps can be optional or skipped by a predicate.
//!
//! A [`Registry`] holds one pipeline per context type so callers only need the context
//! to start the right workflow.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context::Handler;
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::Registry;
