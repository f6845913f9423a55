use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::executor::types::DataStep;
use crate::executor::StepEnv;
use crate::store::DatasetStore;
use crate::validator::{validate_step, ValidationContext};

#[derive(Parser)]
#[command(name = "datastep")]
#[command(about = "Run DATA steps over JSON datasets", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides ./datastep.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a step and write its output datasets
    Run {
        /// Step definition (JSON)
        #[arg(long)]
        step: PathBuf,

        /// Input dataset as NAME=PATH; repeatable
        #[arg(short = 'i', long = "input")]
        inputs: Vec<String>,

        /// Directory for output datasets (default: print to stdout)
        #[arg(short = 'o', long)]
        out_dir: Option<PathBuf>,
    },

    /// Validate a step without running it
    Check {
        /// Step definition (JSON)
        #[arg(long)]
        step: PathBuf,

        /// Input dataset as NAME=PATH; repeatable
        #[arg(short = 'i', long = "input")]
        inputs: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    run_cli_with_args(Cli::parse())
}

/// Run the CLI with an explicit argument list
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    run_cli_with_args(Cli::parse_from(args))
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load eagerly so configuration errors surface before any work is done
    let config = Config::builder().config_path(cli.config).build()?;

    match cli.command {
        Commands::Run {
            step,
            inputs,
            out_dir,
        } => {
            let step = read_step(&step)?;
            let mut store = load_inputs(&inputs)?;
            let env = StepEnv::new(config.engine);

            let outcome = store.run_step(&step, &env)?;

            for dataset in &outcome.datasets {
                let text = serde_json::to_string_pretty(&dataset.to_json())?;
                match &out_dir {
                    Some(dir) => {
                        fs::create_dir_all(dir)
                            .with_context(|| format!("creating {}", dir.display()))?;
                        let path = dir.join(format!("{}.json", dataset.name));
                        fs::write(&path, text)
                            .with_context(|| format!("writing {}", path.display()))?;
                        println!("{}: {} rows -> {}", dataset.name, dataset.len(), path.display());
                    }
                    None => println!("{}", text),
                }
            }

            let stats = outcome.stats;
            eprintln!(
                "{} iterations, {} missing values generated, {} invalid data",
                stats.iterations, stats.missing_values, stats.invalid_data
            );
        }

        Commands::Check { step, inputs } => {
            let step = read_step(&step)?;
            let store = load_inputs(&inputs)?;
            let context = ValidationContext::for_step(&step, &store);
            let issues = validate_step(&step, &context);

            for issue in &issues {
                println!("{}", issue);
            }
            let errors = issues.iter().filter(|i| i.is_error()).count();
            if errors > 0 {
                bail!("{} error(s) found", errors);
            }
            println!("✓ Step is valid");
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn read_step(path: &Path) -> Result<DataStep> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading step {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing step {}", path.display()))
}

fn load_inputs(specs: &[String]) -> Result<DatasetStore> {
    let mut store = DatasetStore::new();
    for spec in specs {
        let (name, path) = parse_input(spec)?;
        store.load_json_file(name, Path::new(path))?;
    }
    Ok(store)
}

/// Split `NAME=PATH`
fn parse_input(spec: &str) -> Result<(&str, &str)> {
    match spec.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok((name, path)),
        _ => bail!("invalid input '{}': expected NAME=PATH", spec),
    }
}
