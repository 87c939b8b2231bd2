//! Command implementations.

pub mod generate;
pub mod validate_cmd;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use daftar_core::{Customer, Lot, QuarterTarget};
use daftar_engine::{Engine, EngineConfig};
use std::path::PathBuf;

/// Input-file arguments shared by every command.
#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Product catalog CSV
    #[arg(long, value_name = "FILE")]
    pub products: PathBuf,

    /// B2B customer roster CSV
    #[arg(long, value_name = "FILE")]
    pub customers: Option<PathBuf>,

    /// Holiday calendar CSV
    #[arg(long, value_name = "FILE")]
    pub holidays: Option<PathBuf>,

    /// Quarter targets JSON
    #[arg(long, value_name = "FILE")]
    pub targets: PathBuf,

    /// Engine configuration JSON (defaults apply when omitted)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the configured random seed
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

/// Everything loaded and ready for an engine run.
pub struct LoadedInputs {
    /// Engine configuration, defaults merged with any config file.
    pub config: EngineConfig,
    /// Product catalog lots.
    pub lots: Vec<Lot>,
    /// B2B customer roster.
    pub customers: Vec<Customer>,
    /// Official holidays.
    pub holidays: Vec<NaiveDate>,
    /// Declared quarter targets.
    pub targets: Vec<QuarterTarget>,
}

impl InputArgs {
    /// Load and shape-check every input file.
    pub fn load(&self) -> Result<LoadedInputs> {
        let mut config = match &self.config {
            Some(path) => daftar_loader::read_config(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }

        let lots = daftar_loader::read_products(&self.products)
            .with_context(|| format!("reading products {}", self.products.display()))?;
        let customers = match &self.customers {
            Some(path) => daftar_loader::read_customers(path)
                .with_context(|| format!("reading customers {}", path.display()))?,
            None => Vec::new(),
        };
        let holidays = match &self.holidays {
            Some(path) => daftar_loader::read_holidays(path)
                .with_context(|| format!("reading holidays {}", path.display()))?,
            None => Vec::new(),
        };
        let targets = daftar_loader::read_targets(&self.targets)
            .with_context(|| format!("reading targets {}", self.targets.display()))?;

        Ok(LoadedInputs {
            config,
            lots,
            customers,
            holidays,
            targets,
        })
    }

    /// Build the engine from loaded inputs.
    pub fn engine(&self) -> Result<(Engine, LoadedInputs)> {
        let inputs = self.load()?;
        let engine = Engine::new(
            inputs.config.clone(),
            inputs.lots.clone(),
            inputs.customers.clone(),
            inputs.holidays.clone(),
            inputs.targets.clone(),
        )
        .context("building engine")?;
        Ok((engine, inputs))
    }
}
