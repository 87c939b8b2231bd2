//! Day-by-day cash-invoice generation for a quarter.
//!
//! Each working day receives a share of the remaining gap proportional to its
//! calendar weight; invoice sizes come from a truncated normal distribution
//! around an adaptive mean. All draws route through the run's single seeded
//! generator.

use crate::composer::compose_cash_basket;
use crate::config::EngineConfig;
use crate::summary::EventCounters;
use crate::weights::{day_weight, is_peak_day, sale_time};
use chrono::NaiveDate;
use daftar_core::calendar::{days_between, working_days};
use daftar_core::money::round2;
use daftar_core::{Buyer, Invoice, InvoiceKind, QuarterTarget};
use daftar_inventory::LotStore;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

/// Per-day invoice cap, a guard against degenerate day targets.
const MAX_INVOICES_PER_DAY: u32 = 50;

/// Generate simplified invoices covering `gap_ex_vat` of ex-VAT sales over
/// the quarter's working days.
///
/// Strict quarters run until the residual drops under the strict tolerance;
/// non-strict quarters stop inside the loose band (95% when close, hard stop
/// at 110%). Invoices come out in chronological day order.
pub fn generate_cash_invoices(
    store: &mut LotStore,
    cfg: &EngineConfig,
    rng: &mut StdRng,
    target: &QuarterTarget,
    gap_ex_vat: Decimal,
    holidays: &HashSet<NaiveDate>,
    events: &mut EventCounters,
) -> Vec<Invoice> {
    let cash_target = round2(gap_ex_vat * cfg.quarter_caps_target_ratio);
    if cash_target <= Decimal::ZERO {
        return Vec::new();
    }

    let days = working_days(target.period_start, target.period_end, holidays);
    let mut invoices: Vec<Invoice> = Vec::new();
    let mut generated = Decimal::ZERO;

    tracing::debug!(
        quarter = %target.label,
        cash_target = %cash_target,
        working_days = days.len(),
        "cash generation start"
    );

    'days: for (i, &day) in days.iter().enumerate() {
        if done(generated, cash_target, target.strict, cfg) {
            break;
        }
        if !store.any_available(day) {
            continue;
        }

        let rest = &days[i..];
        let weight_sum: f64 = rest.iter().map(|&d| day_weight(d, target.period_end)).sum();
        if weight_sum <= 0.0 {
            break;
        }
        let share = day_weight(day, target.period_end) / weight_sum;
        let remaining = cash_target - generated;
        let day_target = round2(
            remaining * Decimal::from_f64(share).unwrap_or(Decimal::ZERO),
        );

        let mut day_generated = Decimal::ZERO;
        let mut day_invoices = 0u32;
        while day_generated < day_target
            && day_invoices < MAX_INVOICES_PER_DAY
            && !done(generated, cash_target, target.strict, cfg)
        {
            if invoices.len() >= cfg.alignment_invoice_cap as usize {
                break 'days;
            }
            let remaining_now = cash_target - generated;
            let size = draw_invoice_size(
                rng,
                cfg,
                day,
                remaining_now,
                rest.len(),
                target.period_end,
            );
            let lines = compose_cash_basket(store, cfg, rng, day, size, events);
            if lines.is_empty() {
                events.empty_baskets += 1;
                break;
            }
            let mut invoice = Invoice::new(
                InvoiceKind::Simplified,
                sale_time(day, rng),
                Buyer::Cash,
            );
            invoice.lines = lines;
            invoice.recompute_totals(cfg.vat_rate);
            generated += invoice.subtotal;
            day_generated += invoice.subtotal;
            day_invoices += 1;
            invoices.push(invoice);
        }
    }

    tracing::debug!(
        quarter = %target.label,
        invoices = invoices.len(),
        generated = %generated,
        "cash generation done"
    );
    invoices
}

/// Early-stop tiers for the cash phase.
fn done(generated: Decimal, cash_target: Decimal, strict: bool, cfg: &EngineConfig) -> bool {
    let remaining = cash_target - generated;
    if strict {
        return remaining <= cfg.alignment_strict_tolerance;
    }
    generated >= cash_target * dec!(1.10)
        || (generated >= cash_target * dec!(0.95) && remaining <= dec!(5000.00))
}

/// Draw a per-invoice ex-VAT size target.
///
/// Truncated normal around `remaining / days_left`, scaled up on peak days
/// and in the closing week, relative σ 0.3, clipped to the configured amount
/// band and never above what is left to generate.
fn draw_invoice_size(
    rng: &mut StdRng,
    cfg: &EngineConfig,
    day: NaiveDate,
    remaining: Decimal,
    days_left: usize,
    period_end: NaiveDate,
) -> Decimal {
    let remaining_f = remaining.to_f64().unwrap_or(0.0).max(0.0);
    let base = remaining_f / days_left.max(1) as f64;

    let mut multiplier = 1.0;
    if is_peak_day(day, period_end) {
        multiplier *= 1.5;
    }
    if days_between(day, period_end) <= 7 {
        multiplier *= 1.5;
    }

    let mean = (base * multiplier).max(1.0);
    let sigma = mean * 0.3;
    let sample = match Normal::new(mean, sigma) {
        Ok(dist) => dist.sample(rng),
        Err(_) => mean,
    };

    let floor = cfg.invoice_min_amount.to_f64().unwrap_or(500.0);
    let cap = cfg
        .invoice_max_amount
        .to_f64()
        .unwrap_or(10_000.0)
        .min(remaining_f);
    let clamped = if remaining_f < floor {
        remaining_f
    } else {
        sample.clamp(floor, cap.max(floor))
    };

    round2(Decimal::from_f64(clamped).unwrap_or(remaining))
}
