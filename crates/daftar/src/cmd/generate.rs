//! `daftar generate`: run the engine and write the CSV reports.

use super::InputArgs;
use crate::report;
use anyhow::{Context, Result};
use clap::Parser;
use daftar_engine::QuarterStatus;
use std::path::PathBuf;
use std::process::ExitCode;

/// Generate the invoice ledger and write CSV reports.
#[derive(Parser, Debug)]
pub struct Args {
    /// Input files.
    #[command(flatten)]
    pub inputs: InputArgs,

    /// Output directory for the report files
    #[arg(short, long, value_name = "DIR", default_value = "reports")]
    pub out: PathBuf,
}

/// Run the command.
pub fn run(args: &Args) -> Result<ExitCode> {
    let (mut engine, inputs) = args.inputs.engine()?;
    let ledger = engine.run();

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    report::write_all(&args.out, &ledger, engine.config())?;

    for quarter in &ledger.summary.quarters {
        tracing::info!(
            quarter = %quarter.label,
            status = ?quarter.status,
            invoices = quarter.invoices,
            actual = %quarter.actual_inc_vat,
            variance = %quarter.variance,
            coverage = %quarter.coverage_ratio,
            "result"
        );
    }
    for deferred in &ledger.deferred {
        tracing::warn!(
            customer = %deferred.customer.name,
            amount = %deferred.customer.purchase_amount_inc_vat,
            reason = %deferred.reason,
            "deferred purchase"
        );
    }
    tracing::info!(
        invoices = ledger.invoices.len(),
        quarters = inputs.targets.len(),
        out = %args.out.display(),
        "reports written"
    );

    let failed = ledger
        .summary
        .quarters
        .iter()
        .any(|q| q.status == QuarterStatus::Unreachable);
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
