//! Declared quarterly totals the generated ledger must reconcile against.

use crate::money::{round2, vat_of};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A quarter's declared VAT-return totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterTarget {
    /// Quarter label, e.g. `Q1-2024`.
    pub label: String,
    /// First day of the period.
    pub period_start: NaiveDate,
    /// Last day of the period.
    pub period_end: NaiveDate,
    /// Declared sales excluding VAT.
    pub sales_ex_vat: Decimal,
    /// Declared VAT amount.
    pub vat_amount: Decimal,
    /// Declared sales including VAT.
    pub sales_inc_vat: Decimal,
    /// Strict quarters must be matched within the strict tolerance; earlier
    /// quarters are best-effort.
    pub strict: bool,
}

/// A declared target whose arithmetic does not hold together.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    /// `sales_inc_vat != sales_ex_vat + vat_amount`.
    #[error("{label}: inc-VAT total {sales_inc_vat} != {sales_ex_vat} + {vat_amount}")]
    TotalMismatch {
        /// Quarter label.
        label: String,
        /// Declared ex-VAT sales.
        sales_ex_vat: Decimal,
        /// Declared VAT.
        vat_amount: Decimal,
        /// Declared inc-VAT sales.
        sales_inc_vat: Decimal,
    },
    /// `vat_amount != round2(sales_ex_vat × rate)`.
    #[error("{label}: VAT {vat_amount} is not {rate} of {sales_ex_vat}")]
    VatMismatch {
        /// Quarter label.
        label: String,
        /// Declared ex-VAT sales.
        sales_ex_vat: Decimal,
        /// Declared VAT.
        vat_amount: Decimal,
        /// VAT rate used for the check.
        rate: Decimal,
    },
    /// The period is empty or inverted.
    #[error("{label}: period {start} .. {end} is empty")]
    EmptyPeriod {
        /// Quarter label.
        label: String,
        /// Declared start.
        start: NaiveDate,
        /// Declared end.
        end: NaiveDate,
    },
}

impl QuarterTarget {
    /// Verify the three declared figures agree with each other at `rate`.
    pub fn check(&self, rate: Decimal) -> Result<(), TargetError> {
        if self.period_end < self.period_start {
            return Err(TargetError::EmptyPeriod {
                label: self.label.clone(),
                start: self.period_start,
                end: self.period_end,
            });
        }
        if round2(self.sales_ex_vat + self.vat_amount) != self.sales_inc_vat {
            return Err(TargetError::TotalMismatch {
                label: self.label.clone(),
                sales_ex_vat: self.sales_ex_vat,
                vat_amount: self.vat_amount,
                sales_inc_vat: self.sales_inc_vat,
            });
        }
        if vat_of(self.sales_ex_vat, rate) != self.vat_amount {
            return Err(TargetError::VatMismatch {
                label: self.label.clone(),
                sales_ex_vat: self.sales_ex_vat,
                vat_amount: self.vat_amount,
                rate,
            });
        }
        Ok(())
    }

    /// True when `date` falls inside the period, inclusive.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.period_start <= date && date <= self.period_end
    }
}
