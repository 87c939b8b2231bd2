//! Lot: the atomic inventory unit.
//!
//! A lot is one physically imported parcel of an item, addressed by
//! `customs_declaration_no:item_description`. Price and cost are frozen at
//! load and never recomputed or averaged across lots.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The excise/inspection tag carried on each lot.
///
/// Governs basket composition: excise lots are exclusive to single-line
/// simplified invoices, and tax invoices accept inspected non-excise lots
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Excise-inspected goods (`EXC_INSPECTION`).
    ExcInspection,
    /// Non-excise inspected goods (`NONEXC_INSPECTION`).
    NonExcInspection,
    /// Goods outside inspection (`NONEXC_OUTSIDE`).
    NonExcOutside,
}

impl Classification {
    /// All classifications, in reporting order.
    pub const ALL: [Self; 3] = [
        Self::ExcInspection,
        Self::NonExcInspection,
        Self::NonExcOutside,
    ];
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcInspection => write!(f, "EXC_INSPECTION"),
            Self::NonExcInspection => write!(f, "NONEXC_INSPECTION"),
            Self::NonExcOutside => write!(f, "NONEXC_OUTSIDE"),
        }
    }
}

impl FromStr for Classification {
    type Err = String;

    /// Accepts the canonical tag names and the Arabic labels used by the
    /// source catalogs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "EXC_INSPECTION" | "محل الفحص سلع انتقائية" => Ok(Self::ExcInspection),
            "NONEXC_INSPECTION" | "محل الفحص سلع غير انتقائية" => {
                Ok(Self::NonExcInspection)
            }
            "NONEXC_OUTSIDE" | "خارج حالة الفحص غير انتقائية" => {
                Ok(Self::NonExcOutside)
            }
            other => Err(format!("unknown classification: {other}")),
        }
    }
}

/// Build a lot id from its two components.
#[must_use]
pub fn lot_id(customs_declaration_no: &str, item_description: &str) -> String {
    format!("{customs_declaration_no}:{item_description}")
}

/// One imported parcel of an item, with its own price and cost.
///
/// Invariants: `0 ≤ qty_remaining ≤ qty_imported`, and the unit price must
/// cover the unit cost for the lot to be eligible for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    /// `customs_declaration_no:item_description`.
    pub lot_id: String,
    /// Customs declaration identifier (kept as text).
    pub customs_declaration_no: String,
    /// Free-form item description, possibly non-Latin.
    pub item_description: String,
    /// Excise/inspection tag.
    pub classification: Classification,
    /// Date the parcel cleared import.
    pub import_date: NaiveDate,
    /// Date the lot becomes sellable: `import_date` + activation delay.
    pub stock_date: NaiveDate,
    /// Units imported.
    pub qty_imported: u32,
    /// Units still unsold.
    pub qty_remaining: u32,
    /// Unit cost excluding VAT, frozen at load.
    pub unit_cost_ex_vat: Decimal,
    /// Unit selling price excluding VAT, frozen at load.
    pub unit_price_ex_vat: Decimal,
}

impl Lot {
    /// Create a lot with a full, untouched quantity and `stock_date` equal to
    /// `import_date` (activation delays are applied by the engine at load).
    #[must_use]
    pub fn new(
        customs_declaration_no: impl Into<String>,
        item_description: impl Into<String>,
        classification: Classification,
        import_date: NaiveDate,
        qty_imported: u32,
        unit_cost_ex_vat: Decimal,
        unit_price_ex_vat: Decimal,
    ) -> Self {
        let customs_declaration_no = customs_declaration_no.into();
        let item_description = item_description.into();
        Self {
            lot_id: lot_id(&customs_declaration_no, &item_description),
            customs_declaration_no,
            item_description,
            classification,
            import_date,
            stock_date: import_date,
            qty_imported,
            qty_remaining: qty_imported,
            unit_cost_ex_vat,
            unit_price_ex_vat,
        }
    }

    /// Set the stock date, consuming self.
    #[must_use]
    pub const fn with_stock_date(mut self, stock_date: NaiveDate) -> Self {
        self.stock_date = stock_date;
        self
    }

    /// True when the lot sells at or above cost.
    ///
    /// Lots violating this are flagged at load and excluded from selection.
    #[must_use]
    pub fn is_profitable(&self) -> bool {
        self.unit_price_ex_vat >= self.unit_cost_ex_vat
    }

    /// True when the lot can supply stock on `as_of`: activated and non-empty.
    #[must_use]
    pub fn is_available(&self, as_of: NaiveDate) -> bool {
        self.stock_date <= as_of && self.qty_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lot() -> Lot {
        Lot::new(
            "10233004466",
            "Instant coffee 200g",
            Classification::NonExcInspection,
            date(2024, 1, 10),
            500,
            dec!(8.00),
            dec!(10.00),
        )
    }

    #[test]
    fn lot_id_format() {
        assert_eq!(lot().lot_id, "10233004466:Instant coffee 200g");
    }

    #[test]
    fn availability_respects_stock_date() {
        let lot = lot().with_stock_date(date(2024, 1, 20));
        assert!(!lot.is_available(date(2024, 1, 15)));
        assert!(lot.is_available(date(2024, 1, 20)));
    }

    #[test]
    fn profitability_flag() {
        let mut lot = lot();
        assert!(lot.is_profitable());
        lot.unit_price_ex_vat = dec!(7.99);
        assert!(!lot.is_profitable());
    }

    #[test]
    fn classification_parses_canonical_and_arabic() {
        assert_eq!(
            "NONEXC_INSPECTION".parse::<Classification>().unwrap(),
            Classification::NonExcInspection
        );
        assert_eq!(
            "محل الفحص سلع انتقائية".parse::<Classification>().unwrap(),
            Classification::ExcInspection
        );
        assert_eq!(
            "خارج حالة الفحص غير انتقائية"
                .parse::<Classification>()
                .unwrap(),
            Classification::NonExcOutside
        );
        assert!("SOMETHING".parse::<Classification>().is_err());
    }
}
