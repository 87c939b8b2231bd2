//! `daftar validate`: regenerate from the same inputs and run the validator
//! battery over the resulting ledger.

use super::InputArgs;
use anyhow::Result;
use clap::Parser;
use daftar_validate::{has_critical, validate, Severity, ValidationInput};
use std::collections::HashSet;
use std::process::ExitCode;

/// Re-run generation and validate the resulting ledger.
#[derive(Parser, Debug)]
pub struct Args {
    /// Input files.
    #[command(flatten)]
    pub inputs: InputArgs,
}

/// Run the command.
pub fn run(args: &Args) -> Result<ExitCode> {
    let (mut engine, inputs) = args.inputs.engine()?;
    let ledger = engine.run();

    let holidays: HashSet<chrono::NaiveDate> = inputs.holidays.iter().copied().collect();
    let findings = validate(&ValidationInput {
        invoices: &ledger.invoices,
        store: engine.store(),
        targets: &inputs.targets,
        holidays: &holidays,
        vat_rate: inputs.config.vat_rate,
        strict_tolerance: inputs.config.alignment_strict_tolerance,
        loose_band: inputs.config.alignment_loose_tolerance,
    });

    for finding in &findings {
        match finding.severity() {
            Severity::Error => tracing::error!(code = %finding.code, "{}", finding.message),
            Severity::Warning => tracing::warn!(code = %finding.code, "{}", finding.message),
            Severity::Info => tracing::info!(code = %finding.code, "{}", finding.message),
        }
    }

    let errors = findings
        .iter()
        .filter(|f| f.severity() == Severity::Error)
        .count();
    tracing::info!(
        invoices = ledger.invoices.len(),
        findings = findings.len(),
        errors,
        "validation finished"
    );

    Ok(if has_critical(&findings) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
