//! Engine configuration
//!
//! Configuration is layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`datastep.toml` in the working directory, or an explicit path)
//! 3. `DATASTEP_` environment variables, with `__` separating sections
//!    (e.g. `DATASTEP_ENGINE__STRICTNESS=strict`)
//!
//! ```no_run
//! use datastep_core::config::Config;
//!
//! let config = Config::builder()
//!     .config_path(Some("./datastep.toml".into()))
//!     .build()?;
//! # Ok::<(), datastep_core::config::ConfigError>(())
//! ```

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default cap on passes through a single loop execution
pub const DEFAULT_MAX_LOOP_ITERATIONS: u64 = 10_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/* ===================== Options ===================== */

/// How text and numbers mix in expressions and assignments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Any text/numeric mix is a type error
    Strict,
    /// Text is parsed as a number and numbers are rendered as text
    #[default]
    Lenient,
}

/// How comparisons treat missing operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingComparison {
    /// Missing sorts below every value and equals itself
    #[default]
    Collate,
    /// Any missing operand makes the comparison missing
    Propagate,
}

/// What happens on division by zero and non-finite results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticPolicy {
    /// The result is missing and the step continues
    #[default]
    Missing,
    /// The step aborts with an arithmetic error
    Error,
}

/// Element order used to map multi-dimensional subscripts onto members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrayOrder {
    #[default]
    RowMajor,
    ColumnMajor,
}

/// Options that change how a step executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub strictness: Strictness,
    pub missing_comparison: MissingComparison,
    pub arithmetic: ArithmeticPolicy,
    pub array_order: ArrayOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_loop_iterations: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strictness: Strictness::default(),
            missing_comparison: MissingComparison::default(),
            arithmetic: ArithmeticPolicy::default(),
            array_order: ArrayOrder::default(),
            max_loop_iterations: Some(DEFAULT_MAX_LOOP_ITERATIONS),
        }
    }
}

/* ===================== Config ===================== */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineOptions,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with the default search path
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Parse configuration from TOML text, without file or environment layers
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let loaded = config::Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Ok(loaded.try_deserialize()?)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Use an explicit config file instead of searching for `datastep.toml`
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let mut builder = config::Config::builder();

        builder = match &self.config_path {
            Some(path) => builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            ),
            None => builder.add_source(
                File::with_name("datastep")
                    .format(FileFormat::Toml)
                    .required(false),
            ),
        };

        builder = builder.add_source(
            Environment::with_prefix("DATASTEP")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }
}
