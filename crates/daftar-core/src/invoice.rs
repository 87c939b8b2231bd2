//! Invoice and invoice-line records.
//!
//! Lines reference lots by `lot_id` and carry copied price/cost snapshots;
//! the inventory owns the lots. Two lines drawing from different lots of the
//! same item are always kept separate with their own prices.

use crate::lot::{Classification, Lot};
use crate::money::{line_subtotal, round2, vat_of};
use crate::party::Customer;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name printed on cash-sale receipts in place of a customer.
pub const CASH_CUSTOMER: &str = "عميل نقدي";

/// Invoice kind: simplified cash receipt or named B2B tax invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceKind {
    /// Cash-sale receipt with no named customer and a TLV/QR payload.
    Simplified,
    /// B2B invoice naming the customer and their VAT number.
    Tax,
}

impl fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simplified => write!(f, "SIMPLIFIED"),
            Self::Tax => write!(f, "TAX"),
        }
    }
}

/// The buying party: the cash sentinel or a B2B customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Buyer {
    /// Anonymous cash customer.
    Cash,
    /// Named B2B customer.
    Business(Customer),
}

impl Buyer {
    /// Display name for reports.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Cash => CASH_CUSTOMER,
            Self::Business(c) => &c.name,
        }
    }

    /// VAT number, if the buyer has one.
    #[must_use]
    pub fn vat_number(&self) -> Option<&str> {
        match self {
            Self::Cash => None,
            Self::Business(c) => Some(&c.vat_number),
        }
    }
}

/// One line of an invoice, drawing from exactly one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// The lot this line draws from.
    pub lot_id: String,
    /// Item description copied from the lot.
    pub item_description: String,
    /// Classification copied from the lot.
    pub classification: Classification,
    /// Units sold; always positive.
    pub quantity: u32,
    /// Lot unit price snapshot, ex VAT.
    pub unit_price_ex_vat: Decimal,
    /// Lot unit cost snapshot, ex VAT.
    pub unit_cost_ex_vat: Decimal,
    /// `round2(unit_price × quantity)`.
    pub line_subtotal: Decimal,
}

impl InvoiceLine {
    /// Build a line for `quantity` units of `lot`.
    #[must_use]
    pub fn new(lot: &Lot, quantity: u32) -> Self {
        Self {
            lot_id: lot.lot_id.clone(),
            item_description: lot.item_description.clone(),
            classification: lot.classification,
            quantity,
            unit_price_ex_vat: lot.unit_price_ex_vat,
            unit_cost_ex_vat: lot.unit_cost_ex_vat,
            line_subtotal: line_subtotal(lot.unit_price_ex_vat, quantity),
        }
    }

    /// Change the quantity and re-derive the subtotal.
    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.line_subtotal = line_subtotal(self.unit_price_ex_vat, quantity);
    }
}

/// A synthesized invoice.
///
/// `subtotal = Σ line.line_subtotal`, `vat_amount = round2(subtotal × rate)`,
/// `total = subtotal + vat_amount`, all at scale 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Sequential number, assigned at the end of alignment.
    pub number: Option<String>,
    /// Simplified or tax.
    pub kind: InvoiceKind,
    /// Issue timestamp; never on a Friday or holiday.
    pub issued_at: NaiveDateTime,
    /// Cash sentinel or B2B customer.
    pub buyer: Buyer,
    /// Ordered lines; one lot per line.
    pub lines: Vec<InvoiceLine>,
    /// Sum of line subtotals.
    pub subtotal: Decimal,
    /// VAT on the subtotal.
    pub vat_amount: Decimal,
    /// Inc-VAT total.
    pub total: Decimal,
}

impl Invoice {
    /// Create an empty invoice; lines and totals come later.
    #[must_use]
    pub fn new(kind: InvoiceKind, issued_at: NaiveDateTime, buyer: Buyer) -> Self {
        Self {
            number: None,
            kind,
            issued_at,
            buyer,
            lines: Vec::new(),
            subtotal: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    /// Issue date (without time of day).
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.issued_at.date()
    }

    /// Re-derive subtotal, VAT, and total from the lines at `rate`.
    pub fn recompute_totals(&mut self, rate: Decimal) {
        let subtotal: Decimal = self.lines.iter().map(|l| l.line_subtotal).sum();
        self.subtotal = round2(subtotal);
        self.vat_amount = vat_of(self.subtotal, rate);
        self.total = self.subtotal + self.vat_amount;
    }

    /// True when any line draws from an excise lot.
    #[must_use]
    pub fn has_excise_line(&self) -> bool {
        self.lines
            .iter()
            .any(|l| l.classification == Classification::ExcInspection)
    }
}

/// Format an invoice number: `{PREFIX}-{YYYYMM}-{SEQ}`.
///
/// Simplified and tax invoices draw from separate sequence spaces; the
/// sequence is contiguous per kind across the whole run.
#[must_use]
pub fn format_number(prefix: &str, date: NaiveDate, seq: u32) -> String {
    format!("{prefix}-{:04}{:02}-{seq:05}", date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lot(price: Decimal, cost: Decimal) -> Lot {
        Lot::new(
            "D1",
            "Tea 500g",
            Classification::NonExcInspection,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            100,
            cost,
            price,
        )
    }

    fn timestamp() -> NaiveDateTime {
        crate::calendar::at_time(NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(), 13, 15)
    }

    #[test]
    fn totals_follow_lines() {
        let mut invoice = Invoice::new(InvoiceKind::Simplified, timestamp(), Buyer::Cash);
        invoice.lines.push(InvoiceLine::new(&lot(dec!(10.00), dec!(8.00)), 100));
        invoice.lines.push(InvoiceLine::new(&lot(dec!(12.00), dec!(9.00)), 50));
        invoice.recompute_totals(dec!(0.15));

        assert_eq!(invoice.subtotal, dec!(1600.00));
        assert_eq!(invoice.vat_amount, dec!(240.00));
        assert_eq!(invoice.total, dec!(1840.00));
    }

    #[test]
    fn set_quantity_rederives_subtotal() {
        let mut line = InvoiceLine::new(&lot(dec!(10.00), dec!(8.00)), 3);
        assert_eq!(line.line_subtotal, dec!(30.00));
        line.set_quantity(4);
        assert_eq!(line.line_subtotal, dec!(40.00));
    }

    #[test]
    fn number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();
        assert_eq!(format_number("INV", date, 7), "INV-202403-00007");
    }

    #[test]
    fn buyer_identity() {
        assert_eq!(Buyer::Cash.name(), CASH_CUSTOMER);
        assert!(Buyer::Cash.vat_number().is_none());
    }
}
