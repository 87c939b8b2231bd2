//! Quarterly alignment: the per-quarter state machine and run orchestration.
//!
//! For each quarter: fulfil B2B purchases at fixed amounts, generate cash
//! invoices into the remaining gap, refine quantities toward the declared
//! total, and fall back to one reported balancing invoice when a strict
//! quarter still misses. Sequence numbers are assigned at the end of the run
//! in a deterministic traversal by date, then intra-day emission order.

use crate::b2b::{fulfil_quarter, DeferredPurchase};
use crate::config::{EngineConfig, PricingPolicy};
use crate::error::EngineError;
use crate::refine::refine_to_target;
use crate::simulator::generate_cash_invoices;
use crate::summary::{EventCounters, QuarterOutcome, QuarterStatus, RunSummary};
use crate::weights::sale_time;
use chrono::{Duration, NaiveDate};
use daftar_core::calendar::working_days;
use daftar_core::invoice::format_number;
use daftar_core::money::{net_of, round2};
use daftar_core::{Buyer, Customer, Invoice, InvoiceKind, InvoiceLine, Lot, QuarterTarget};
use daftar_inventory::LotStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// A finished run: the invoice stream, deferred purchases, and the summary.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// All invoices, chronological, numbered.
    pub invoices: Vec<Invoice>,
    /// B2B purchases that produced no invoice.
    pub deferred: Vec<DeferredPurchase>,
    /// Per-quarter outcomes and stock statistics.
    pub summary: RunSummary,
}

/// The generation engine. Owns the inventory and the single seeded
/// generator for the whole run.
pub struct Engine {
    cfg: EngineConfig,
    store: LotStore,
    holidays: HashSet<NaiveDate>,
    customers: Vec<Customer>,
    targets: Vec<QuarterTarget>,
    rng: StdRng,
}

impl Engine {
    /// Build an engine from pre-parsed inputs.
    ///
    /// Validates the pricing policy and every quarter target, seeds the
    /// generator, loads the lot store, and applies activation delays.
    pub fn new(
        cfg: EngineConfig,
        lots: Vec<Lot>,
        customers: Vec<Customer>,
        holidays: Vec<NaiveDate>,
        mut targets: Vec<QuarterTarget>,
    ) -> Result<Self, EngineError> {
        if cfg.pricing_policy == PricingPolicy::WeightedAvg {
            if !cfg.allow_weighted_avg {
                return Err(EngineError::DisallowedPricingPolicy);
            }
            return Err(EngineError::UnsupportedPricingPolicy);
        }
        if targets.is_empty() {
            return Err(EngineError::NoTargets);
        }
        targets.sort_by_key(|t| t.period_start);
        for target in &targets {
            target.check(cfg.vat_rate)?;
        }

        let mut rng = StdRng::seed_from_u64(cfg.random_seed);
        let mut store = LotStore::load(lots)?;
        apply_activation_delays(&mut store, &cfg, &targets, &mut rng);

        Ok(Self {
            cfg,
            store,
            holidays: holidays.into_iter().collect(),
            customers,
            targets,
            rng,
        })
    }

    /// Final inventory state, for validation and reporting.
    #[must_use]
    pub fn store(&self) -> &LotStore {
        &self.store
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Run every configured quarter and return the finished ledger.
    pub fn run(&mut self) -> Ledger {
        let store_before = self.store.summary();
        tracing::info!(
            lots = store_before.total_lots,
            items = store_before.distinct_items,
            units = store_before.units_remaining,
            "generation starting"
        );

        let targets = self.targets.clone();
        let mut invoices = Vec::new();
        let mut deferred = Vec::new();
        let mut outcomes = Vec::new();
        for target in &targets {
            let (quarter_invoices, quarter_deferred, outcome) = self.align_quarter(target);
            tracing::info!(
                quarter = %target.label,
                invoices = outcome.invoices,
                actual = %outcome.actual_inc_vat,
                target_total = %outcome.target_inc_vat,
                variance = %outcome.variance,
                status = ?outcome.status,
                "quarter aligned"
            );
            invoices.extend(quarter_invoices);
            deferred.extend(quarter_deferred);
            outcomes.push(outcome);
        }

        assign_numbers(&mut invoices, &self.cfg.invoice_prefix);
        let summary = RunSummary {
            total_invoices: invoices.len(),
            quarters: outcomes,
            store_before,
            store_after: self.store.summary(),
        };
        Ledger {
            invoices,
            deferred,
            summary,
        }
    }

    /// The per-quarter state machine: B2B phase, cash phase, refinement,
    /// balancing fallback.
    fn align_quarter(
        &mut self,
        target: &QuarterTarget,
    ) -> (Vec<Invoice>, Vec<DeferredPurchase>, QuarterOutcome) {
        let mut events = EventCounters::default();

        let phase = fulfil_quarter(
            &mut self.store,
            &self.cfg,
            &mut self.rng,
            target,
            &self.customers,
            &mut events,
        );
        let b2b_subtotal: Decimal = phase.invoices.iter().map(|i| i.subtotal).sum();
        let gap = target.sales_ex_vat - b2b_subtotal;

        let mut invoices = phase.invoices;
        let cash = generate_cash_invoices(
            &mut self.store,
            &self.cfg,
            &mut self.rng,
            target,
            gap,
            &self.holidays,
            &mut events,
        );
        invoices.extend(cash);

        let refine_outcome =
            refine_to_target(&mut invoices, &mut self.store, &self.cfg, target);

        let mut balancing_used = false;
        let mut delta = target.sales_inc_vat - ledger_total(&invoices);
        if target.strict && delta.abs() > self.cfg.alignment_strict_tolerance {
            if let Some(invoice) = self.balancing_invoice(target, delta) {
                tracing::warn!(
                    quarter = %target.label,
                    residual = %delta,
                    amount = %invoice.total,
                    "balancing invoice synthesized"
                );
                invoices.push(invoice);
                balancing_used = true;
                delta = target.sales_inc_vat - ledger_total(&invoices);
            }
        }

        let actual = ledger_total(&invoices);
        let status = if !target.strict {
            QuarterStatus::BestEffort
        } else if delta.abs() <= self.cfg.alignment_strict_tolerance {
            QuarterStatus::Aligned
        } else {
            QuarterStatus::Unreachable
        };
        let coverage_ratio = if target.sales_inc_vat.is_zero() {
            Decimal::ZERO
        } else {
            (actual / target.sales_inc_vat).round_dp(4)
        };

        let outcome = QuarterOutcome {
            label: target.label.clone(),
            strict: target.strict,
            status,
            invoices: invoices.len(),
            tax_invoices: invoices
                .iter()
                .filter(|i| i.kind == InvoiceKind::Tax)
                .count(),
            simplified_invoices: invoices
                .iter()
                .filter(|i| i.kind == InvoiceKind::Simplified)
                .count(),
            line_items: invoices.iter().map(|i| i.lines.len()).sum(),
            target_inc_vat: target.sales_inc_vat,
            actual_inc_vat: actual,
            variance: actual - target.sales_inc_vat,
            coverage_ratio,
            deferred_purchases: phase.deferred.len(),
            refine_iterations: refine_outcome.iterations,
            balancing_invoice_used: balancing_used,
            events,
        };
        (invoices, phase.deferred, outcome)
    }

    /// Synthesize one simplified invoice closing a positive residual gap.
    ///
    /// Picks the eligible lot and quantity whose subtotal lands closest to
    /// the backed-out residue, dated on the quarter's last working day. The
    /// caller reports the fallback; it is never silent.
    fn balancing_invoice(&mut self, target: &QuarterTarget, delta_inc: Decimal) -> Option<Invoice> {
        if delta_inc <= self.cfg.alignment_strict_tolerance {
            return None;
        }
        let day = *working_days(target.period_start, target.period_end, &self.holidays)
            .last()?;
        let subtotal_needed = net_of(delta_inc, self.cfg.vat_rate);

        let mut pool: Vec<Lot> = self
            .store
            .available_lots(day, None)
            .into_iter()
            .filter(|l| l.classification != daftar_core::Classification::ExcInspection)
            .filter(|l| l.is_profitable() && l.unit_price_ex_vat > Decimal::ZERO)
            .cloned()
            .collect();
        pool.sort_by(|a, b| {
            (a.stock_date, a.import_date, &a.lot_id).cmp(&(b.stock_date, b.import_date, &b.lot_id))
        });

        let mut best: Option<(Lot, u32, Decimal)> = None;
        for lot in pool {
            let ideal = (subtotal_needed / lot.unit_price_ex_vat)
                .round()
                .to_u32()
                .unwrap_or(0)
                .clamp(1, lot.qty_remaining.max(1));
            if ideal > lot.qty_remaining {
                continue;
            }
            let subtotal = round2(lot.unit_price_ex_vat * Decimal::from(ideal));
            let miss = (subtotal - subtotal_needed).abs();
            if best.as_ref().map_or(true, |(_, _, m)| miss < *m) {
                best = Some((lot, ideal, miss));
            }
        }

        let (lot, qty, _) = best?;
        self.store.deduct(&lot.lot_id, qty).ok()?;
        let mut invoice = Invoice::new(
            InvoiceKind::Simplified,
            sale_time(day, &mut self.rng),
            Buyer::Cash,
        );
        invoice.lines.push(InvoiceLine::new(&lot, qty));
        invoice.recompute_totals(self.cfg.vat_rate);
        Some(invoice)
    }
}

fn ledger_total(invoices: &[Invoice]) -> Decimal {
    invoices.iter().map(|i| i.total).sum()
}

/// Draw activation delays once per lot at load.
///
/// Lots imported on or before the end of the earliest quarter ship with no
/// delay, avoiding starvation in the opening period; every other lot draws
/// uniformly from the configured window, clamped to `[0, 12]` days.
fn apply_activation_delays(
    store: &mut LotStore,
    cfg: &EngineConfig,
    targets: &[QuarterTarget],
    rng: &mut StdRng,
) {
    let earliest_end = targets[0].period_end;
    let min = cfg.lot_activation_days[0].min(12);
    let max = cfg.lot_activation_days[1].clamp(min, 12);
    for lot in store.lots_mut() {
        let delay = if lot.import_date <= earliest_end {
            0
        } else {
            rng.gen_range(min..=max)
        };
        lot.stock_date = lot.import_date + Duration::days(i64::from(delay));
    }
}

/// Number the ledger: stable sort by date (intra-day emission order is
/// preserved), then contiguous per-kind sequences.
fn assign_numbers(invoices: &mut [Invoice], prefix: &str) {
    invoices.sort_by_key(Invoice::date);
    let mut simplified_seq = 0u32;
    let mut tax_seq = 0u32;
    for invoice in invoices.iter_mut() {
        let seq = match invoice.kind {
            InvoiceKind::Simplified => {
                simplified_seq += 1;
                simplified_seq
            }
            InvoiceKind::Tax => {
                tax_seq += 1;
                tax_seq
            }
        };
        invoice.number = Some(format_number(prefix, invoice.date(), seq));
    }
}
