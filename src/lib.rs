//! A DATA step engine
//!
//! Steps are statement trees (see [`executor::types::ast`]) executed over
//! in-memory datasets held in a [`store::DatasetStore`].
//!
//! ```no_run
//! use datastep_core::{DatasetStore, StepEnv};
//! # fn demo(step: datastep_core::DataStep) -> anyhow::Result<()> {
//! let mut store = DatasetStore::new();
//! store.load_json_file("scores", "scores.json".as_ref())?;
//! let outcome = store.run_step(&step, &StepEnv::default())?;
//! println!("{} rows", outcome.datasets[0].len());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod executor;
pub mod store;
pub mod types;
pub mod validator;

pub use config::{Config, EngineOptions};
pub use executor::types::{DataStep, Value, VarType};
pub use executor::{run_step, StepEnv, StepError, StepFailure, StepOutcome};
pub use store::DatasetStore;
pub use types::{Column, Dataset};
