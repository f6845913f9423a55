//! Test helpers for executor tests
//!
//! Builders for datasets and steps, and runners that push every step
//! through a JSON round trip before executing it.

use std::collections::HashMap;

use crate::config::EngineOptions;
use crate::executor::types::{ByKey, DataStep, InputBinding, InputSpec, OutputSpec, Stmt, Value};
use crate::executor::{run_step, StepEnv, StepFailure, StepOutcome};
use crate::store::DatasetStore;
use crate::types::{Column, Dataset};

pub fn num(v: f64) -> Value {
    Value::Num(v)
}

pub fn text(s: &str) -> Value {
    Value::text(s)
}

/// Build a dataset from columns and rows; panics on malformed rows
pub fn dataset(name: &str, columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Dataset {
    let mut dataset = Dataset::new(name, columns);
    for row in rows {
        dataset.push_row(row).expect("Fixture row does not fit its columns");
    }
    dataset
}

/// A single-column numeric dataset
pub fn numbers(name: &str, column: &str, values: &[f64]) -> Dataset {
    dataset(
        name,
        vec![Column::num(column)],
        values.iter().map(|&v| vec![num(v)]).collect(),
    )
}

pub fn store(datasets: HashMap<&str, Dataset>) -> DatasetStore {
    let mut store = DatasetStore::new();
    for (_, dataset) in datasets {
        store.insert(dataset);
    }
    store
}

pub fn input(name: &str) -> InputSpec {
    InputSpec {
        name: name.to_string(),
        ..InputSpec::default()
    }
}

pub fn by(keys: &[&str]) -> Vec<ByKey> {
    keys.iter()
        .map(|k| ByKey {
            name: k.to_string(),
            descending: false,
        })
        .collect()
}

pub fn set(datasets: Vec<InputSpec>) -> Option<InputBinding> {
    Some(InputBinding::Set {
        datasets,
        by: vec![],
        end: None,
    })
}

pub fn set_by(datasets: Vec<InputSpec>, keys: &[&str]) -> Option<InputBinding> {
    Some(InputBinding::Set {
        datasets,
        by: by(keys),
        end: None,
    })
}

pub fn merge_by(datasets: Vec<InputSpec>, keys: &[&str]) -> Option<InputBinding> {
    Some(InputBinding::Merge {
        datasets,
        by: by(keys),
        end: None,
    })
}

pub fn step(outputs: &[&str], input: Option<InputBinding>, body: Vec<Stmt>) -> DataStep {
    DataStep {
        outputs: outputs
            .iter()
            .map(|name| OutputSpec {
                name: name.to_string(),
                ..OutputSpec::default()
            })
            .collect(),
        input,
        body,
    }
}

/// Serialize and deserialize, as a step arriving from a front end would
fn round_trip(step: &DataStep) -> DataStep {
    let json = serde_json::to_string(step).expect("Step serialization failed");
    serde_json::from_str(&json).expect("Step deserialization failed")
}

pub fn try_run_with(
    step: &DataStep,
    store: &DatasetStore,
    options: EngineOptions,
) -> Result<StepOutcome, StepFailure> {
    run_step(&round_trip(step), store, &StepEnv::new(options))
}

/// Run with default options; panics if the step fails
pub fn run(step: &DataStep, store: &DatasetStore) -> StepOutcome {
    try_run_with(step, store, EngineOptions::default())
        .unwrap_or_else(|e| panic!("Step failed: {}", e))
}

/// Run with default options; panics if the step succeeds
pub fn run_err(step: &DataStep, store: &DatasetStore) -> StepFailure {
    match try_run_with(step, store, EngineOptions::default()) {
        Ok(outcome) => panic!("Expected failure, got {:?}", outcome.datasets),
        Err(failure) => failure,
    }
}

/// Values of one column of one output dataset
pub fn column(outcome: &StepOutcome, dataset: &str, name: &str) -> Vec<Value> {
    let dataset = outcome
        .dataset(dataset)
        .unwrap_or_else(|| panic!("No output dataset {}", dataset));
    dataset
        .column_values(name)
        .unwrap_or_else(|| panic!("No column {} in {}", name, dataset.name))
        .into_iter()
        .cloned()
        .collect()
}

pub fn nums(values: &[f64]) -> Vec<Value> {
    values.iter().map(|&v| num(v)).collect()
}
