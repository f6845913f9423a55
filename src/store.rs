//! In-memory dataset store
//!
//! Steps read their inputs from a [`DatasetStore`] and, through
//! [`DatasetStore::run_step`], write their outputs back to it. Names are
//! case-insensitive.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::executor::{run_step, StepEnv, StepFailure, StepOutcome};
use crate::executor::types::DataStep;
use crate::types::{Dataset, DatasetError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: DatasetError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    datasets: HashMap<String, Dataset>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a dataset under its own name
    pub fn insert(&mut self, dataset: Dataset) {
        self.datasets
            .insert(dataset.name.to_ascii_uppercase(), dataset);
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(&name.to_ascii_uppercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<Dataset> {
        self.datasets.remove(&name.to_ascii_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(&name.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Dataset names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.datasets.values().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Load a dataset from a JSON file and store it as `name`
    pub fn load_json_file(&mut self, name: &str, path: &Path) -> Result<&Dataset, StoreError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: display.clone(),
            source,
        })?;
        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| StoreError::Parse {
            path: display.clone(),
            source: DatasetError::Json(e),
        })?;
        let mut dataset = Dataset::from_json(name, json).map_err(|source| StoreError::Parse {
            path: display,
            source,
        })?;
        dataset.name = name.to_string();

        tracing::debug!(name, rows = dataset.len(), "loaded dataset");
        let key = name.to_ascii_uppercase();
        self.datasets.insert(key.clone(), dataset);
        Ok(&self.datasets[&key])
    }

    /// Run a step against this store and commit its outputs.
    ///
    /// Outputs replace same-named datasets only when the whole step succeeds;
    /// a failed step leaves the store untouched.
    pub fn run_step(&mut self, step: &DataStep, env: &StepEnv) -> Result<StepOutcome, StepFailure> {
        let outcome = run_step(step, self, env)?;
        for dataset in &outcome.datasets {
            self.insert(dataset.clone());
        }
        Ok(outcome)
    }
}
