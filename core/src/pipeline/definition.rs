// src/pipeline/definition.rs

//! The `Pipeline<TData, Err>` struct and its structural editing methods.

use crate::core::context::Handler;
use crate::core::step::{SkipCondition, StepDef};
use crate::error::FlowError;
use std::collections::HashMap;

/// An ordered workflow over the context type `TData` whose handlers fail with `Err`.
///
/// `Err` must absorb [`FlowError`] so that engine-level failures (a required step with no
/// handlers, for instance) come back through the same channel as handler errors.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Builds a pipeline from `(name, optional, skip_if)` triples, in execution order.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let mut pipeline = Self {
      steps: Vec::with_capacity(step_defs.len()),
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    };
    for (name, optional, skip_if) in step_defs {
      pipeline.ensure_step_not_exists(name);
      pipeline.steps.push(StepDef {
        name: (*name).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      });
    }
    pipeline
  }

  /// Step names in execution order.
  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn has_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  /// Index of a step. Unknown names are a setup bug, so this panics.
  pub(crate) fn step_index(&self, step_name: &str) -> usize {
    match self.steps.iter().position(|s| s.name == step_name) {
      Some(idx) => idx,
      None => panic!("Pipeline setup error: step '{}' is not defined.", step_name),
    }
  }

  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    self.step_index(step_name);
  }

  fn ensure_step_not_exists(&self, step_name: &str) {
    if self.has_step(step_name) {
      panic!("Pipeline setup error: step '{}' is defined twice.", step_name);
    }
  }

  pub fn insert_before_step<S: Into<String>>(
    &mut self,
    existing_step_name: &str,
    new_step_name: S,
    optional: bool,
    skip_if: Option<SkipCondition<TData>>,
  ) {
    let idx = self.step_index(existing_step_name);
    self.insert_at(idx, new_step_name.into(), optional, skip_if);
  }

  pub fn insert_after_step<S: Into<String>>(
    &mut self,
    existing_step_name: &str,
    new_step_name: S,
    optional: bool,
    skip_if: Option<SkipCondition<TData>>,
  ) {
    let idx = self.step_index(existing_step_name);
    self.insert_at(idx + 1, new_step_name.into(), optional, skip_if);
  }

  fn insert_at(&mut self, idx: usize, name: String, optional: bool, skip_if: Option<SkipCondition<TData>>) {
    self.ensure_step_not_exists(&name);
    self.steps.insert(idx, StepDef { name, optional, skip_if });
  }

  /// Removes a step and all of its handlers. Unknown names are ignored.
  pub fn remove_step(&mut self, step_name: &str) {
    self.steps.retain(|s| s.name != step_name);
    self.before.remove(step_name);
    self.on.remove(step_name);
    self.after.remove(step_name);
  }

  pub fn set_optional(&mut self, step_name: &str, optional: bool) {
    let idx = self.step_index(step_name);
    self.steps[idx].optional = optional;
  }

  pub fn set_skip_condition(&mut self, step_name: &str, skip_if: Option<SkipCondition<TData>>) {
    let idx = self.step_index(step_name);
    self.steps[idx].skip_if = skip_if;
  }
}
