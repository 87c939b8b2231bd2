//! Ledger validation rules.
//!
//! This crate implements the post-run checks over a generated ledger:
//!
//! - Price fidelity (line prices equal catalog lot prices)
//! - Profitability (no line sells below its lot's cost)
//! - Inventory integrity (no lot oversold, deductions reconcile)
//! - Arithmetic consistency (subtotal/VAT/total derivations)
//! - Quarter totals (strict closure, loose-band variance)
//! - Calendar (no Friday or holiday invoices)
//! - Classification (excise exclusivity, tax-invoice purity)
//! - Numbering (contiguous per-kind sequences)
//!
//! # Error Codes
//!
//! | Code | Description |
//! |------|-------------|
//! | V1001 | Line price differs from catalog lot price |
//! | V1002 | Line references an unknown lot |
//! | V2001 | Line sells below lot cost |
//! | V3001 | Lot oversold (remaining exceeds imported) |
//! | V3002 | Sold units do not reconcile with lot deductions |
//! | V4001 | Invoice subtotal is not the sum of its lines |
//! | V4002 | Invoice VAT is not the rounded rate of its subtotal |
//! | V4003 | Invoice total is not subtotal plus VAT |
//! | V4004 | Line subtotal is not the rounded price × quantity |
//! | V5001 | Strict quarter total outside tolerance |
//! | V5002 | Non-strict quarter outside the loose band (warning) |
//! | V5003 | Non-strict quarter variance (info) |
//! | V6001 | Invoice dated on a Friday |
//! | V6002 | Invoice dated on a holiday |
//! | V7001 | Excise line mixed with other lines |
//! | V7002 | Tax invoice carries a non-inspected line |
//! | V8001 | Sequence gap or disorder in invoice numbering |
//! | V8002 | Invoice without a number |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{Datelike, NaiveDate, Weekday};
use daftar_core::money::{line_subtotal, vat_of};
use daftar_core::{Classification, Decimal, Invoice, InvoiceKind, QuarterTarget};
use daftar_inventory::LotStore;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Validation rule identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    /// V1001: Line price differs from the catalog lot price.
    PriceDrift,
    /// V1002: Line references a lot the catalog does not know.
    UnknownLot,
    /// V2001: Line sells below the lot's cost.
    BelowCost,
    /// V3001: Lot remaining quantity exceeds its imported quantity.
    Oversold,
    /// V3002: Units sold do not reconcile with the lot's deductions.
    DeductionDrift,
    /// V4001: Invoice subtotal differs from the sum of its lines.
    SubtotalMismatch,
    /// V4002: Invoice VAT differs from the rounded rate of its subtotal.
    VatMismatch,
    /// V4003: Invoice total differs from subtotal plus VAT.
    TotalMismatch,
    /// V4004: Line subtotal differs from rounded price × quantity.
    LineSubtotalMismatch,
    /// V5001: Strict quarter missed its tolerance.
    StrictVariance,
    /// V5002: Non-strict quarter outside the loose acceptance band.
    LooseVariance,
    /// V5003: Non-strict quarter variance, informational.
    Variance,
    /// V6001: Invoice dated on a Friday.
    FridayInvoice,
    /// V6002: Invoice dated on a holiday.
    HolidayInvoice,
    /// V7001: Excise line sharing an invoice with other lines.
    ExciseMixing,
    /// V7002: Tax invoice carrying a line outside `NONEXC_INSPECTION`.
    TaxClassification,
    /// V8001: Numbering gap or disorder within a sequence space.
    NumberingGap,
    /// V8002: Invoice left unnumbered.
    MissingNumber,
}

impl Check {
    /// Stable code string.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PriceDrift => "V1001",
            Self::UnknownLot => "V1002",
            Self::BelowCost => "V2001",
            Self::Oversold => "V3001",
            Self::DeductionDrift => "V3002",
            Self::SubtotalMismatch => "V4001",
            Self::VatMismatch => "V4002",
            Self::TotalMismatch => "V4003",
            Self::LineSubtotalMismatch => "V4004",
            Self::StrictVariance => "V5001",
            Self::LooseVariance => "V5002",
            Self::Variance => "V5003",
            Self::FridayInvoice => "V6001",
            Self::HolidayInvoice => "V6002",
            Self::ExciseMixing => "V7001",
            Self::TaxClassification => "V7002",
            Self::NumberingGap => "V8001",
            Self::MissingNumber => "V8002",
        }
    }

    /// Severity of a finding with this code.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::LooseVariance => Severity::Warning,
            Self::Variance => Severity::Info,
            _ => Severity::Error,
        }
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The ledger is invalid; the run is reported failed.
    Error,
    /// Suspicious but acceptable.
    Warning,
    /// Recorded for the run summary only.
    Info,
}

/// One validation finding.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct ValidationError {
    /// Rule that fired.
    pub code: Check,
    /// Human-readable description.
    pub message: String,
    /// Invoice number involved, when applicable.
    pub invoice: Option<String>,
}

impl ValidationError {
    fn new(code: Check, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            invoice: None,
        }
    }

    fn on(mut self, invoice: &Invoice) -> Self {
        self.invoice = invoice.number.clone();
        self
    }

    /// Severity of this finding.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.code.severity()
    }
}

/// Everything the validator battery needs to see.
pub struct ValidationInput<'a> {
    /// The full invoice stream, in ledger order.
    pub invoices: &'a [Invoice],
    /// Final inventory state (prices are frozen, so it doubles as the
    /// catalog).
    pub store: &'a LotStore,
    /// Declared quarter targets.
    pub targets: &'a [QuarterTarget],
    /// Official holidays.
    pub holidays: &'a HashSet<NaiveDate>,
    /// VAT rate the run used.
    pub vat_rate: Decimal,
    /// Strict-quarter tolerance.
    pub strict_tolerance: Decimal,
    /// `[low, high]` acceptance band for non-strict quarters.
    pub loose_band: [Decimal; 2],
}

/// Run every check and collect findings.
#[must_use]
pub fn validate(input: &ValidationInput<'_>) -> Vec<ValidationError> {
    let mut findings = Vec::new();
    check_lines(input, &mut findings);
    check_inventory(input, &mut findings);
    check_arithmetic(input, &mut findings);
    check_quarters(input, &mut findings);
    check_calendar(input, &mut findings);
    check_classification(input, &mut findings);
    check_numbering(input, &mut findings);
    findings
}

/// True when any finding is a hard error.
#[must_use]
pub fn has_critical(findings: &[ValidationError]) -> bool {
    findings.iter().any(|f| f.severity() == Severity::Error)
}

fn check_lines(input: &ValidationInput<'_>, findings: &mut Vec<ValidationError>) {
    for invoice in input.invoices {
        for line in &invoice.lines {
            let Some(lot) = input.store.lot(&line.lot_id) else {
                findings.push(
                    ValidationError::new(
                        Check::UnknownLot,
                        format!("line references unknown lot {}", line.lot_id),
                    )
                    .on(invoice),
                );
                continue;
            };
            if line.unit_price_ex_vat != lot.unit_price_ex_vat {
                findings.push(
                    ValidationError::new(
                        Check::PriceDrift,
                        format!(
                            "lot {} sold at {} but catalog price is {}",
                            line.lot_id, line.unit_price_ex_vat, lot.unit_price_ex_vat
                        ),
                    )
                    .on(invoice),
                );
            }
            if line.unit_price_ex_vat < lot.unit_cost_ex_vat {
                findings.push(
                    ValidationError::new(
                        Check::BelowCost,
                        format!(
                            "lot {} sold at {} below cost {}",
                            line.lot_id, line.unit_price_ex_vat, lot.unit_cost_ex_vat
                        ),
                    )
                    .on(invoice),
                );
            }
        }
    }
}

fn check_inventory(input: &ValidationInput<'_>, findings: &mut Vec<ValidationError>) {
    let mut sold: HashMap<&str, u64> = HashMap::new();
    for invoice in input.invoices {
        for line in &invoice.lines {
            *sold.entry(line.lot_id.as_str()).or_default() += u64::from(line.quantity);
        }
    }
    for lot in input.store.lots() {
        if lot.qty_remaining > lot.qty_imported {
            findings.push(ValidationError::new(
                Check::Oversold,
                format!(
                    "lot {} remaining {} exceeds imported {}",
                    lot.lot_id, lot.qty_remaining, lot.qty_imported
                ),
            ));
        }
        let deducted = u64::from(lot.qty_imported) - u64::from(lot.qty_remaining.min(lot.qty_imported));
        let sold_units = sold.get(lot.lot_id.as_str()).copied().unwrap_or(0);
        if deducted != sold_units {
            findings.push(ValidationError::new(
                Check::DeductionDrift,
                format!(
                    "lot {}: {} units deducted but {} appear on invoices",
                    lot.lot_id, deducted, sold_units
                ),
            ));
        }
    }
}

fn check_arithmetic(input: &ValidationInput<'_>, findings: &mut Vec<ValidationError>) {
    for invoice in input.invoices {
        let lines_sum: Decimal = invoice.lines.iter().map(|l| l.line_subtotal).sum();
        if invoice.subtotal != lines_sum {
            findings.push(
                ValidationError::new(
                    Check::SubtotalMismatch,
                    format!("subtotal {} != line sum {}", invoice.subtotal, lines_sum),
                )
                .on(invoice),
            );
        }
        let expected_vat = vat_of(invoice.subtotal, input.vat_rate);
        if invoice.vat_amount != expected_vat {
            findings.push(
                ValidationError::new(
                    Check::VatMismatch,
                    format!("VAT {} != expected {}", invoice.vat_amount, expected_vat),
                )
                .on(invoice),
            );
        }
        if invoice.total != invoice.subtotal + invoice.vat_amount {
            findings.push(
                ValidationError::new(
                    Check::TotalMismatch,
                    format!(
                        "total {} != {} + {}",
                        invoice.total, invoice.subtotal, invoice.vat_amount
                    ),
                )
                .on(invoice),
            );
        }
        for line in &invoice.lines {
            if line.line_subtotal != line_subtotal(line.unit_price_ex_vat, line.quantity) {
                findings.push(
                    ValidationError::new(
                        Check::LineSubtotalMismatch,
                        format!(
                            "line on lot {}: subtotal {} != {} x {}",
                            line.lot_id, line.line_subtotal, line.unit_price_ex_vat, line.quantity
                        ),
                    )
                    .on(invoice),
                );
            }
        }
    }
}

fn check_quarters(input: &ValidationInput<'_>, findings: &mut Vec<ValidationError>) {
    for target in input.targets {
        let actual: Decimal = input
            .invoices
            .iter()
            .filter(|i| target.contains(i.date()))
            .map(|i| i.total)
            .sum();
        let variance = actual - target.sales_inc_vat;
        if target.strict {
            if variance.abs() > input.strict_tolerance {
                findings.push(ValidationError::new(
                    Check::StrictVariance,
                    format!(
                        "{}: actual {} misses declared {} by {}",
                        target.label, actual, target.sales_inc_vat, variance
                    ),
                ));
            }
        } else if target.sales_inc_vat > Decimal::ZERO {
            let ratio = actual / target.sales_inc_vat;
            let code = if ratio < input.loose_band[0] || ratio > input.loose_band[1] {
                Check::LooseVariance
            } else {
                Check::Variance
            };
            findings.push(ValidationError::new(
                code,
                format!(
                    "{}: coverage {} of declared {}",
                    target.label,
                    ratio.round_dp(4),
                    target.sales_inc_vat
                ),
            ));
        }
    }
}

fn check_calendar(input: &ValidationInput<'_>, findings: &mut Vec<ValidationError>) {
    for invoice in input.invoices {
        let date = invoice.date();
        if date.weekday() == Weekday::Fri {
            findings.push(
                ValidationError::new(Check::FridayInvoice, format!("invoice dated {date}"))
                    .on(invoice),
            );
        }
        if input.holidays.contains(&date) {
            findings.push(
                ValidationError::new(Check::HolidayInvoice, format!("invoice dated {date}"))
                    .on(invoice),
            );
        }
    }
}

fn check_classification(input: &ValidationInput<'_>, findings: &mut Vec<ValidationError>) {
    for invoice in input.invoices {
        let has_excise = invoice
            .lines
            .iter()
            .any(|l| l.classification == Classification::ExcInspection);
        if has_excise && invoice.lines.len() > 1 {
            findings.push(
                ValidationError::new(
                    Check::ExciseMixing,
                    format!("excise line among {} lines", invoice.lines.len()),
                )
                .on(invoice),
            );
        }
        if invoice.kind == InvoiceKind::Tax {
            for line in &invoice.lines {
                if line.classification != Classification::NonExcInspection {
                    findings.push(
                        ValidationError::new(
                            Check::TaxClassification,
                            format!(
                                "tax invoice carries {} lot {}",
                                line.classification, line.lot_id
                            ),
                        )
                        .on(invoice),
                    );
                }
            }
        }
    }
}

fn check_numbering(input: &ValidationInput<'_>, findings: &mut Vec<ValidationError>) {
    let mut expected: HashMap<InvoiceKind, u32> = HashMap::new();
    for invoice in input.invoices {
        let Some(number) = invoice.number.as_deref() else {
            findings.push(ValidationError::new(
                Check::MissingNumber,
                format!("unnumbered {} invoice dated {}", invoice.kind, invoice.date()),
            ));
            continue;
        };
        let seq = number
            .rsplit('-')
            .next()
            .and_then(|s| s.parse::<u32>().ok());
        let slot = expected.entry(invoice.kind).or_insert(0);
        *slot += 1;
        match seq {
            Some(seq) if seq == *slot => {}
            Some(seq) => findings.push(
                ValidationError::new(
                    Check::NumberingGap,
                    format!("{} sequence jumped to {seq}, expected {}", invoice.kind, *slot),
                )
                .on(invoice),
            ),
            None => findings.push(
                ValidationError::new(
                    Check::NumberingGap,
                    format!("malformed invoice number {number}"),
                )
                .on(invoice),
            ),
        }
    }
}
