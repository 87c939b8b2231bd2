//! Run summary: per-quarter outcomes and recoverable-event counters.

use daftar_inventory::StoreSummary;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Counts of locally-recovered events, useful for diagnosing low-coverage
/// quarters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounters {
    /// Deductions refused for lack of stock.
    pub insufficient_stock: u32,
    /// Lots skipped because their price fell below cost.
    pub profitability_skips: u32,
    /// Composer attempts that produced no usable line.
    pub basket_retries: u32,
    /// Basket requests that returned empty.
    pub empty_baskets: u32,
}

impl EventCounters {
    /// Fold another counter set into this one.
    pub fn merge(&mut self, other: &Self) {
        self.insufficient_stock += other.insufficient_stock;
        self.profitability_skips += other.profitability_skips;
        self.basket_retries += other.basket_retries;
        self.empty_baskets += other.empty_baskets;
    }
}

/// How a quarter's alignment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuarterStatus {
    /// Strict quarter closed within the strict tolerance.
    Aligned,
    /// Non-strict quarter; variance recorded, not failed.
    BestEffort,
    /// Strict quarter missed the tolerance after refinement and fallback.
    Unreachable,
}

/// One row of the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterOutcome {
    /// Quarter label.
    pub label: String,
    /// Whether the quarter was strict.
    pub strict: bool,
    /// How alignment ended.
    pub status: QuarterStatus,
    /// Invoices emitted for the quarter.
    pub invoices: usize,
    /// Tax invoices among them.
    pub tax_invoices: usize,
    /// Simplified invoices among them.
    pub simplified_invoices: usize,
    /// Total line items.
    pub line_items: usize,
    /// Declared inc-VAT target.
    pub target_inc_vat: Decimal,
    /// Achieved inc-VAT total.
    pub actual_inc_vat: Decimal,
    /// `actual − target`.
    pub variance: Decimal,
    /// `actual / target`, the coverage ratio (1.0 = exact).
    pub coverage_ratio: Decimal,
    /// B2B purchases deferred in this quarter.
    pub deferred_purchases: usize,
    /// Refinement iterations spent across both tiers.
    pub refine_iterations: u32,
    /// Whether the balancing-invoice fallback fired.
    pub balancing_invoice_used: bool,
    /// Recoverable events observed during generation.
    pub events: EventCounters,
}

/// Summary of a full generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// One outcome row per quarter, in chronological order.
    pub quarters: Vec<QuarterOutcome>,
    /// Total invoices in the ledger.
    pub total_invoices: usize,
    /// Stock statistics before generation.
    pub store_before: StoreSummary,
    /// Stock statistics after generation.
    pub store_after: StoreSummary,
}

impl RunSummary {
    /// True when every strict quarter aligned.
    #[must_use]
    pub fn all_strict_aligned(&self) -> bool {
        self.quarters
            .iter()
            .filter(|q| q.strict)
            .all(|q| q.status == QuarterStatus::Aligned)
    }
}
