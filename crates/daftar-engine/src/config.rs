//! Runtime configuration for the generation engine.
//!
//! Every option has a default; a config file only needs to name the options
//! it overrides.

use daftar_core::Seller;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How line prices are derived from inventory.
///
/// The system requires per-lot pricing; weighted-average pricing exists as a
/// parseable value but is rejected at engine start unless explicitly enabled
/// through [`EngineConfig::allow_weighted_avg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingPolicy {
    /// Each line carries its lot's frozen catalog price. The default.
    LotPrice,
    /// Average prices across lots of an item. Disallowed unless opted in.
    WeightedAvg,
}

/// Engine options, deserializable from JSON with per-field defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// VAT multiplier applied to every subtotal.
    pub vat_rate: Decimal,
    /// Seed for the single pseudo-random generator.
    pub random_seed: u64,
    /// Prefix used in invoice numbering.
    pub invoice_prefix: String,
    /// `[min, max]` days added to `import_date` to form `stock_date`.
    pub lot_activation_days: [u32; 2],
    /// `[min, max]` lines per invoice (excise-exclusive invoices force 1).
    pub line_items_per_invoice: [u32; 2],
    /// `[min, max]` units per line.
    pub quantity_per_line: [u32; 2],
    /// Line pricing policy.
    pub pricing_policy: PricingPolicy,
    /// Explicit opt-in required for `weighted_avg` pricing.
    pub allow_weighted_avg: bool,
    /// Governor ratio applied to each quarter's cash-generation target.
    pub quarter_caps_target_ratio: Decimal,
    /// Share of simplified invoices that are excise-exclusive.
    pub excise_exclusive_ratio: f64,
    /// Closing tolerance for strict quarters.
    pub alignment_strict_tolerance: Decimal,
    /// `[low, high]` acceptance band for non-strict quarters.
    pub alignment_loose_tolerance: [Decimal; 2],
    /// Tolerance for the coarse refinement pass.
    pub refine_coarse_tolerance: Decimal,
    /// Iteration cap per refinement pass.
    pub refine_max_iterations: u32,
    /// Retry cap per basket composition.
    pub basket_attempt_cap: u32,
    /// Cash-invoice cap per quarter.
    pub alignment_invoice_cap: u32,
    /// Smallest cash-invoice target amount.
    pub invoice_min_amount: Decimal,
    /// Largest cash-invoice target amount.
    pub invoice_max_amount: Decimal,
    /// Seller identity for tax invoices and the QR payload.
    pub seller: Seller,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vat_rate: dec!(0.15),
            random_seed: 42,
            invoice_prefix: "INV".to_string(),
            lot_activation_days: [7, 12],
            line_items_per_invoice: [2, 10],
            quantity_per_line: [3, 40],
            pricing_policy: PricingPolicy::LotPrice,
            allow_weighted_avg: false,
            quarter_caps_target_ratio: dec!(1.00),
            excise_exclusive_ratio: 0.2,
            alignment_strict_tolerance: dec!(0.10),
            alignment_loose_tolerance: [dec!(0.80), dec!(1.20)],
            refine_coarse_tolerance: dec!(5.00),
            refine_max_iterations: 50,
            basket_attempt_cap: 50,
            alignment_invoice_cap: 1000,
            invoice_min_amount: dec!(500),
            invoice_max_amount: dec!(10000),
            seller: Seller {
                name: "مؤسسة رائد الإنجاز للخدمات التجارية".to_string(),
                vat_number: "302167780700003".to_string(),
                address: "الرياض، السلي 14322".to_string(),
            },
        }
    }
}

impl EngineConfig {
    /// Minimum lines per invoice.
    #[must_use]
    pub fn min_lines(&self) -> u32 {
        self.line_items_per_invoice[0].max(1)
    }

    /// Maximum lines per invoice.
    #[must_use]
    pub fn max_lines(&self) -> u32 {
        self.line_items_per_invoice[1].max(self.min_lines())
    }

    /// Minimum units per line.
    #[must_use]
    pub fn min_qty(&self) -> u32 {
        self.quantity_per_line[0].max(1)
    }

    /// Maximum units per line.
    #[must_use]
    pub fn max_qty(&self) -> u32 {
        self.quantity_per_line[1].max(self.min_qty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.vat_rate, dec!(0.15));
        assert_eq!(cfg.random_seed, 42);
        assert_eq!(cfg.lot_activation_days, [7, 12]);
        assert_eq!(cfg.pricing_policy, PricingPolicy::LotPrice);
        assert!(!cfg.allow_weighted_avg);
        assert_eq!(cfg.alignment_strict_tolerance, dec!(0.10));
        assert_eq!(cfg.refine_max_iterations, 50);
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"random_seed": 7, "invoice_prefix": "LED"}"#).unwrap();
        assert_eq!(cfg.random_seed, 7);
        assert_eq!(cfg.invoice_prefix, "LED");
        assert_eq!(cfg.vat_rate, dec!(0.15));
    }

    #[test]
    fn pricing_policy_snake_case() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"pricing_policy": "weighted_avg"}"#).unwrap();
        assert_eq!(cfg.pricing_policy, PricingPolicy::WeightedAvg);
    }
}
