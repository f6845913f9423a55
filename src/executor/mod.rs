//! DATA step executor
//!
//! A step runs in two passes. The static pass (`declarations`) walks the
//! statement tree once, builds the program data vector and binds arrays and
//! outputs. The driver then loops over input rows, executing the body once
//! per row.

pub mod arrays;
mod declarations;
pub mod driver;
pub mod errors;
pub mod expressions;
pub mod output;
pub mod pdv;
pub mod sources;
pub mod statements;
pub mod stdlib;
pub mod types;

#[cfg(test)]
mod tests;

pub use driver::{run_step, DriverState, StepOutcome, StepStats};
pub use errors::{ErrorKind, StepError, StepFailure};
pub use stdlib::{Builtins, FunctionError, FunctionRegistry};

use crate::config::EngineOptions;

use arrays::ArrayBindings;
use output::OutputSink;
use pdv::Pdv;

/// Everything a step needs that does not come from the step itself
pub struct StepEnv {
    pub options: EngineOptions,
    pub functions: Box<dyn FunctionRegistry + Send + Sync>,
}

impl StepEnv {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            functions: Box::new(Builtins),
        }
    }

    /// Replace the function library
    pub fn with_functions(mut self, functions: impl FunctionRegistry + Send + Sync + 'static) -> Self {
        self.functions = Box::new(functions);
        self
    }
}

impl Default for StepEnv {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl std::fmt::Debug for StepEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepEnv")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Mutable state of one running step
pub struct ExecContext<'e> {
    pub pdv: Pdv,
    pub arrays: ArrayBindings,
    pub env: &'e StepEnv,
    pub sink: OutputSink,
    pub stats: StepStats,
    /// Lines written by `PUT`
    pub log: Vec<String>,
}

impl<'e> ExecContext<'e> {
    pub fn new(pdv: Pdv, arrays: ArrayBindings, env: &'e StepEnv, sink: OutputSink) -> Self {
        Self {
            pdv,
            arrays,
            env,
            sink,
            stats: StepStats::default(),
            log: Vec::new(),
        }
    }
}
