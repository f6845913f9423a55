//! Iteration driver
//!
//! Runs one step to completion:
//!
//! ```text
//! Initializing -> Reading -> Executing -> Emitting -> Reading ... -> Finished
//!                    \            \
//!                     `------------`--> Failed
//! ```
//!
//! A failure in any phase aborts the whole step. Output rows live in the
//! sink until the step finishes, so a failed step returns no datasets.

use crate::store::DatasetStore;
use crate::types::Dataset;
use crate::validator::check_step;

use super::declarations::{prepare, BoundInput, Prepared};
use super::errors::{StepError, StepFailure};
use super::pdv::SlotId;
use super::sources::{BoundRow, BoundRows, Concat, Interleave, Merge, OneToOne, RowSource, Single};
use super::statements::execute_block;
use super::types::{Control, DataStep, InputBinding, Stmt, Value};
use super::{ExecContext, StepEnv};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Initializing,
    Reading,
    Executing,
    Emitting,
    Finished,
    Failed,
}

/// Diagnostics gathered while a step runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Iterations executed (the final value of `_N_`)
    pub iterations: usize,
    /// Operations that produced missing values from missing operands
    pub missing_values: usize,
    /// Text that could not be read as a number
    pub invalid_data: usize,
}

/// Result of a successful step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// One dataset per DATA-statement name, in the order named
    pub datasets: Vec<Dataset>,
    pub stats: StepStats,
    /// Lines written by `PUT`
    pub log: Vec<String>,
}

impl StepOutcome {
    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }
}

struct Driver<'a, 'e> {
    state: DriverState,
    ctx: ExecContext<'e>,
    inputs: Vec<BoundInput<'a>>,
    first_slots: Vec<SlotId>,
    last_slots: Vec<SlotId>,
    end_slot: Option<SlotId>,
    n_slot: SlotId,
    error_slot: SlotId,
    explicit_output: bool,
}

impl<'a, 'e> Driver<'a, 'e> {
    fn transition(&mut self, next: DriverState) {
        tracing::trace!(from = ?self.state, to = ?next, "driver state");
        self.state = next;
    }

    /// Reset the PDV and load the bound row
    fn load_row(&mut self, row: &BoundRow, n: usize) -> Result<(), StepError> {
        let pdv = &mut self.ctx.pdv;
        if n > 1 {
            pdv.reset_for_next_iteration();
        }
        pdv.store(self.n_slot, Value::Num(n as f64));
        pdv.store(self.error_slot, Value::Num(0.0));

        for (input, picked) in self.inputs.iter().zip(&row.rows) {
            if let Some(slot) = input.in_slot {
                pdv.store(slot, Value::boolean(picked.is_some()));
            }
        }

        // Carried rows first so rows read this iteration win shared columns
        for pass_carried in [true, false] {
            for (i, input) in self.inputs.iter().enumerate() {
                let carried = row.carried.get(i).copied().unwrap_or(false);
                if carried != pass_carried {
                    continue;
                }
                let Some(index) = row.rows.get(i).copied().flatten() else {
                    continue;
                };
                let values = &input.source.dataset.rows[index];
                for &(column, slot) in &input.columns {
                    pdv.set_slot(slot, values[column].clone())?;
                }
            }
        }

        for (&slot, &flag) in self.first_slots.iter().zip(&row.first) {
            pdv.store(slot, Value::boolean(flag));
        }
        for (&slot, &flag) in self.last_slots.iter().zip(&row.last) {
            pdv.store(slot, Value::boolean(flag));
        }
        if let Some(slot) = self.end_slot {
            pdv.store(slot, Value::boolean(row.is_last));
        }
        Ok(())
    }

    fn run(&mut self, body: &[Stmt], rows: &mut BoundRows<'a>) -> Result<(), StepFailure> {
        let mut n = 0usize;
        let fail = |error: StepError, n: usize| StepFailure {
            error,
            row: (n > 0).then_some(n),
        };

        loop {
            self.transition(DriverState::Reading);
            let Some(row) = rows.next_row().map_err(|e| fail(e, n))? else {
                break;
            };
            n += 1;

            self.transition(DriverState::Executing);
            self.load_row(&row, n).map_err(|e| fail(e, n))?;
            let control = execute_block(body, &mut self.ctx).map_err(|e| fail(e, n))?;

            match control {
                Control::Leave => return Err(fail(StepError::Scoping { statement: "LEAVE" }, n)),
                Control::Continue => {
                    return Err(fail(StepError::Scoping { statement: "CONTINUE" }, n))
                }
                _ => {}
            }

            self.transition(DriverState::Emitting);
            let implicit = !self.explicit_output
                && matches!(control, Control::None | Control::Return);
            if implicit {
                self.ctx.sink.record_implicit(&self.ctx.pdv);
            }
            let emitted = self.ctx.sink.commit_iteration();
            tracing::trace!(n, emitted, "iteration complete");

            if self.ctx.pdv.get_slot(self.error_slot).is_truthy() {
                tracing::warn!(n, "_ERROR_ set during iteration");
            }

            if control == Control::Stop {
                tracing::debug!(n, "STOP executed");
                break;
            }
        }

        self.ctx.stats.iterations = n;
        Ok(())
    }
}

fn open_rows<'a>(binding: Option<&InputBinding>, inputs: &[BoundInput<'a>]) -> BoundRows<'a> {
    let sources = inputs.iter().map(|i| i.source.clone()).collect::<Vec<_>>();
    let source: Box<dyn RowSource + 'a> = match binding {
        None => Box::new(Single::default()),
        Some(InputBinding::Set { by, .. }) if by.is_empty() => Box::new(Concat::new(sources)),
        Some(InputBinding::Set { by, .. }) => Box::new(Interleave::new(sources, by.clone())),
        Some(InputBinding::Merge { by, .. }) if by.is_empty() => Box::new(OneToOne::new(sources)),
        Some(InputBinding::Merge { by, .. }) => Box::new(Merge::new(sources, by.clone())),
    };
    BoundRows::new(source)
}

/// Execute a DATA step against the datasets in `store`.
///
/// Inputs are only read. On success the outcome holds one dataset per
/// DATA-statement name; use [`DatasetStore::run_step`] to write them back.
pub fn run_step(
    step: &DataStep,
    store: &DatasetStore,
    env: &StepEnv,
) -> Result<StepOutcome, StepFailure> {
    let names: Vec<&str> = step.outputs.iter().map(|o| o.name.as_str()).collect();
    tracing::debug!(state = ?DriverState::Initializing, outputs = ?names, "starting step");

    let prepared = check_step(step, store)
        .and_then(|()| prepare(step, store, env))
        .map_err(|error| {
            tracing::debug!(state = ?DriverState::Failed, %error, "step failed during initialization");
            StepFailure { error, row: None }
        })?;

    let Prepared {
        mut pdv,
        arrays,
        sink,
        inputs,
        first_slots,
        last_slots,
        end_slot,
        n_slot,
        error_slot,
        explicit_output,
    } = prepared;
    pdv.initialize();

    let mut rows = open_rows(step.input.as_ref(), &inputs);
    let mut driver = Driver {
        state: DriverState::Initializing,
        ctx: ExecContext::new(pdv, arrays, env, sink),
        inputs,
        first_slots,
        last_slots,
        end_slot,
        n_slot,
        error_slot,
        explicit_output,
    };

    if let Err(failure) = driver.run(&step.body, &mut rows) {
        driver.transition(DriverState::Failed);
        tracing::debug!(error = %failure, "step failed");
        return Err(failure);
    }
    driver.transition(DriverState::Finished);

    let ExecContext {
        pdv, sink, mut stats, log, ..
    } = driver.ctx;
    stats.invalid_data = pdv.invalid_data();
    let datasets = sink.finalize(&pdv);

    for dataset in &datasets {
        tracing::info!(
            dataset = %dataset.name,
            rows = dataset.len(),
            columns = dataset.columns.len(),
            "output written"
        );
    }
    if stats.missing_values > 0 {
        tracing::info!(
            count = stats.missing_values,
            "missing values were generated by operations on missing values"
        );
    }

    Ok(StepOutcome {
        datasets,
        stats,
        log,
    })
}
