//! Semantic validation for DATA steps
//!
//! Rule-based checks that run before the static pass, so mistakes in the
//! statement tree are reported with their source spans before any row is
//! read.
//!
//! # Usage
//!
//! ```ignore
//! use datastep_core::validator::{validate_step, ValidationContext};
//!
//! let context = ValidationContext::for_step(&step, &store);
//! for issue in validate_step(&step, &context) {
//!     eprintln!("{}", issue);
//! }
//! ```
//!
//! # Rules
//!
//! Each check lives in `validator/rules/` as a [`ValidationRule`] and is
//! registered in [`Validator::new`]. Rules that make a step impossible to run
//! report errors carrying the [`StepError`] the driver would raise; suspicious
//! but runnable code, such as reading a variable nothing ever assigns, is a
//! warning.
//!
//! [`check_step`] is what [`run_step`](crate::executor::run_step) calls: the
//! first error aborts the step before the PDV is built.

pub mod rules;

use std::collections::HashSet;

use crate::executor::errors::StepError;
use crate::executor::types::ast::{DataStep, Span};
use crate::store::DatasetStore;

// ============================================================================
// Findings
// ============================================================================

/// A problem found in a step, located by the span of the offending node
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub span: Span,
    pub message: String,
    pub severity: Severity,
    /// Id of the reporting rule, e.g. `output-target`
    pub rule_id: &'static str,
    /// The step error this becomes when the step is run
    pub cause: Option<StepError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The step cannot run
    Error,
    /// The step runs, but probably not as intended
    Warning,
}

impl ValidationError {
    /// An error whose message is that of the step error it stands for
    pub fn error(span: Span, cause: StepError, rule_id: &'static str) -> Self {
        Self {
            span,
            message: cause.to_string(),
            severity: Severity::Error,
            rule_id,
            cause: Some(cause),
        }
    }

    pub fn warning(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Warning,
            rule_id,
            cause: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{} at line {}, col {}: {} [{}]",
            severity,
            self.span.start_line + 1,
            self.span.start_col + 1,
            self.message,
            self.rule_id
        )
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// Names visible to a step
// ============================================================================

/// What the step can see besides its own statements
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Upper-cased names supplied by inputs: columns, IN=, END=, FIRST./LAST.
    provided: HashSet<String>,
}

impl ValidationContext {
    /// Collect the names the step's input binding puts in the PDV
    pub fn for_step(step: &DataStep, store: &DatasetStore) -> Self {
        let mut context = Self::default();
        context.provide("_N_");
        context.provide("_ERROR_");

        let Some(binding) = &step.input else {
            return context;
        };

        for spec in binding.datasets() {
            if let Some(dataset) = store.get(&spec.name) {
                for column in &dataset.columns {
                    let renamed = spec
                        .rename
                        .iter()
                        .find(|(old, _)| old.eq_ignore_ascii_case(&column.name))
                        .map(|(_, new)| new.as_str())
                        .unwrap_or(column.name.as_str());
                    context.provide(renamed);
                }
            }
            if let Some(in_var) = &spec.in_var {
                context.provide(in_var);
            }
        }
        for key in binding.by() {
            context.provide(&format!("FIRST.{}", key.name));
            context.provide(&format!("LAST.{}", key.name));
        }
        if let Some(end) = binding.end() {
            context.provide(end);
        }
        context
    }

    pub fn provide(&mut self, name: &str) {
        self.provided.insert(name.to_ascii_uppercase());
    }

    pub fn is_provided(&self, name: &str) -> bool {
        self.provided.contains(&name.to_ascii_uppercase())
    }
}

// ============================================================================
// Rule trait
// ============================================================================

/// One independent check over a step's statement tree
pub trait ValidationRule: Send + Sync {
    /// Stable id shown in brackets after each message, e.g. `loop-control`
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn validate(&self, step: &DataStep, context: &ValidationContext) -> Vec<ValidationError>;
}

// ============================================================================
// Validator
// ============================================================================

/// The registered rules, run in order
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(rules::LoopControlRule),
                Box::new(rules::OutputTargetRule),
                Box::new(rules::UndefinedArrayRule),
                // Warnings only
                Box::new(rules::UninitializedVariableRule),
            ],
        }
    }

    /// Findings of every rule, grouped by rule in registration order
    pub fn validate(&self, step: &DataStep, context: &ValidationContext) -> Vec<ValidationError> {
        self.rules
            .iter()
            .flat_map(|rule| rule.validate(step, context))
            .collect()
    }

    /// Registered rules as (id, description) pairs
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Entry points
// ============================================================================

pub fn validate_step(step: &DataStep, context: &ValidationContext) -> Vec<ValidationError> {
    Validator::new().validate(step, context)
}

/// Validate a step against a store and turn the first error into a step
/// error. Warnings are logged.
pub fn check_step(step: &DataStep, store: &DatasetStore) -> Result<(), StepError> {
    let context = ValidationContext::for_step(step, store);
    let mut first_error = None;

    for issue in validate_step(step, &context) {
        if issue.is_error() {
            if first_error.is_none() {
                first_error = Some(issue);
            }
        } else {
            tracing::warn!(rule = issue.rule_id, "{}", issue.message);
        }
    }

    match first_error {
        Some(issue) => Err(issue.cause.unwrap_or(StepError::Configuration {
            message: issue.message,
        })),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests;
