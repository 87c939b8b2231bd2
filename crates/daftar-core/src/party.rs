//! Parties on an invoice: the seller and B2B customers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The merchant issuing the reconstructed ledger.
///
/// A process-wide constant carried in configuration; its name and VAT number
/// feed the TLV QR payload on simplified invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    /// Registered business name.
    pub name: String,
    /// VAT registration number, kept as text.
    pub vat_number: String,
    /// Address line.
    pub address: String,
}

/// A B2B customer purchase record.
///
/// Each record is used exactly once, to produce one tax invoice whose inc-VAT
/// total equals `purchase_amount_inc_vat` exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Business name.
    pub name: String,
    /// Tax registration number, kept as text to retain leading zeros.
    pub vat_number: String,
    /// Address line.
    pub address: String,
    /// Declared purchase amount including VAT.
    pub purchase_amount_inc_vat: Decimal,
    /// Date of the purchase; the tax invoice is dated the same day.
    pub purchase_date: NaiveDate,
}
