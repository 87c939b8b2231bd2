//! Post-generation refinement: ±1-quantity adjustments that close residual
//! variance without disturbing the calendar shape.
//!
//! Increases land on peak-day invoices, decreases on slow days. Tax invoices
//! are never touched; their totals are fixed by the customer roster. A coarse
//! pass runs for every quarter; strict quarters add a second pass that chases
//! the strict tolerance.

use crate::config::EngineConfig;
use crate::weights::is_peak_day;
use daftar_core::money::round2;
use daftar_core::{Invoice, InvoiceKind, QuarterTarget};
use daftar_inventory::LotStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a refinement run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineOutcome {
    /// Iterations spent across both tiers.
    pub iterations: u32,
    /// `target − total` before refinement.
    pub initial_variance: Decimal,
    /// `target − total` after refinement.
    pub final_variance: Decimal,
}

/// One adjustable line, scored by its inc-VAT step size.
struct Candidate {
    invoice_idx: usize,
    line_idx: usize,
    step: Decimal,
    peak: bool,
    drop_line: bool,
}

/// Refine the quarter's invoices toward its declared inc-VAT total.
pub fn refine_to_target(
    invoices: &mut [Invoice],
    store: &mut LotStore,
    cfg: &EngineConfig,
    target: &QuarterTarget,
) -> RefineOutcome {
    let initial_variance = target.sales_inc_vat - ledger_total(invoices);

    let mut iterations = run_pass(
        invoices,
        store,
        cfg,
        target,
        cfg.refine_coarse_tolerance,
    );
    if target.strict {
        iterations += run_pass(
            invoices,
            store,
            cfg,
            target,
            cfg.alignment_strict_tolerance,
        );
    }

    let final_variance = target.sales_inc_vat - ledger_total(invoices);
    tracing::debug!(
        quarter = %target.label,
        iterations,
        initial = %initial_variance,
        residual = %final_variance,
        "refinement finished"
    );
    RefineOutcome {
        iterations,
        initial_variance,
        final_variance,
    }
}

fn ledger_total(invoices: &[Invoice]) -> Decimal {
    invoices.iter().map(|i| i.total).sum()
}

fn run_pass(
    invoices: &mut [Invoice],
    store: &mut LotStore,
    cfg: &EngineConfig,
    target: &QuarterTarget,
    tolerance: Decimal,
) -> u32 {
    let mut iterations = 0;
    while iterations < cfg.refine_max_iterations {
        let delta = target.sales_inc_vat - ledger_total(invoices);
        if delta.abs() <= tolerance {
            break;
        }
        let adjusted = if delta > Decimal::ZERO {
            increase_once(invoices, store, cfg, target, delta)
        } else {
            decrease_once(invoices, store, cfg, target, -delta)
        };
        if !adjusted {
            break;
        }
        iterations += 1;
    }
    iterations
}

/// Inc-VAT effect of moving one unit of this line.
fn unit_step(price: Decimal, rate: Decimal) -> Decimal {
    round2(price * (Decimal::ONE + rate))
}

/// Pick the candidate whose step lands `|delta|` closest to zero, preferring
/// peak (or slow) days. Steps beyond 1.5× the gap are rejected outright;
/// when nothing qualifies, the smallest step is the fallback.
fn best_candidate(candidates: Vec<Candidate>, delta: Decimal, prefer_peak: bool) -> Option<Candidate> {
    if candidates.is_empty() {
        return None;
    }
    let pick = |pool: &[usize], all: &[Candidate]| -> Option<usize> {
        pool.iter()
            .copied()
            .filter(|&i| all[i].step <= delta * Decimal::new(15, 1))
            .min_by_key(|&i| (delta - all[i].step).abs())
    };

    let preferred: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.peak == prefer_peak)
        .map(|(i, _)| i)
        .collect();
    let everyone: Vec<usize> = (0..candidates.len()).collect();

    let chosen = pick(&preferred, &candidates)
        .or_else(|| pick(&everyone, &candidates))
        .or_else(|| {
            everyone
                .iter()
                .copied()
                .min_by_key(|&i| candidates[i].step)
        })?;
    candidates.into_iter().nth(chosen)
}

fn increase_once(
    invoices: &mut [Invoice],
    store: &mut LotStore,
    cfg: &EngineConfig,
    target: &QuarterTarget,
    delta: Decimal,
) -> bool {
    let mut candidates = Vec::new();
    for (invoice_idx, invoice) in invoices.iter().enumerate() {
        if invoice.kind != InvoiceKind::Simplified {
            continue;
        }
        let peak = is_peak_day(invoice.date(), target.period_end);
        for (line_idx, line) in invoice.lines.iter().enumerate() {
            let has_stock = store
                .lot(&line.lot_id)
                .is_some_and(|l| l.qty_remaining >= 1);
            if !has_stock {
                continue;
            }
            candidates.push(Candidate {
                invoice_idx,
                line_idx,
                step: unit_step(line.unit_price_ex_vat, cfg.vat_rate),
                peak,
                drop_line: false,
            });
        }
    }

    let Some(chosen) = best_candidate(candidates, delta, true) else {
        return false;
    };
    let invoice = &mut invoices[chosen.invoice_idx];
    let line = &mut invoice.lines[chosen.line_idx];
    if store.deduct(&line.lot_id, 1).is_err() {
        return false;
    }
    let qty = line.quantity + 1;
    line.set_quantity(qty);
    invoice.recompute_totals(cfg.vat_rate);
    true
}

fn decrease_once(
    invoices: &mut [Invoice],
    store: &mut LotStore,
    cfg: &EngineConfig,
    target: &QuarterTarget,
    delta: Decimal,
) -> bool {
    let mut candidates = Vec::new();
    for (invoice_idx, invoice) in invoices.iter().enumerate() {
        if invoice.kind != InvoiceKind::Simplified {
            continue;
        }
        // Slow days preferred, so `peak` records the same flag and the
        // selection inverts the preference.
        let peak = is_peak_day(invoice.date(), target.period_end);
        for (line_idx, line) in invoice.lines.iter().enumerate() {
            if line.quantity > 1 {
                candidates.push(Candidate {
                    invoice_idx,
                    line_idx,
                    step: unit_step(line.unit_price_ex_vat, cfg.vat_rate),
                    peak,
                    drop_line: false,
                });
            } else if invoice.lines.len() > 1 {
                // A quantity-1 line never drops below one unit; it drops out
                // of the invoice entirely.
                candidates.push(Candidate {
                    invoice_idx,
                    line_idx,
                    step: line.line_subtotal + round2(line.line_subtotal * cfg.vat_rate),
                    peak,
                    drop_line: true,
                });
            }
        }
    }

    let Some(chosen) = best_candidate(candidates, delta, false) else {
        return false;
    };
    let invoice = &mut invoices[chosen.invoice_idx];
    if chosen.drop_line {
        let line = invoice.lines.remove(chosen.line_idx);
        let _ = store.restore(&line.lot_id, line.quantity);
    } else {
        let line = &mut invoice.lines[chosen.line_idx];
        let _ = store.restore(&line.lot_id, 1);
        let qty = line.quantity - 1;
        line.set_quantity(qty);
    }
    invoice.recompute_totals(cfg.vat_rate);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use daftar_core::calendar::at_time;
    use daftar_core::{Buyer, Classification, InvoiceLine, Lot};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lot(decl: &str, price: Decimal, qty: u32) -> Lot {
        Lot::new(
            decl,
            "Tea",
            Classification::NonExcOutside,
            date(2024, 1, 1),
            qty,
            price / dec!(2),
            price,
        )
    }

    fn quarter() -> QuarterTarget {
        QuarterTarget {
            label: "Q1-2024".to_string(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 3, 31),
            sales_ex_vat: dec!(1000.00),
            vat_amount: dec!(150.00),
            sales_inc_vat: dec!(1150.00),
            strict: true,
        }
    }

    fn invoice_with(store: &mut LotStore, lot_id: &str, qty: u32, day: NaiveDate) -> Invoice {
        store.deduct(lot_id, qty).unwrap();
        let snapshot = store.lot(lot_id).unwrap().clone();
        let mut invoice = Invoice::new(
            InvoiceKind::Simplified,
            at_time(day, 13, 0),
            Buyer::Cash,
        );
        invoice.lines.push(InvoiceLine::new(&snapshot, qty));
        invoice.recompute_totals(dec!(0.15));
        invoice
    }

    #[test]
    fn under_target_adds_units_on_peak_days() {
        let mut store = LotStore::load(vec![lot("D1", dec!(10.00), 1000)]).unwrap();
        let cfg = EngineConfig::default();
        // 2024-02-01 Thu (peak), 2024-02-05 Mon (slow)
        let mut invoices = vec![
            invoice_with(&mut store, "D1:Tea", 40, date(2024, 2, 1)),
            invoice_with(&mut store, "D1:Tea", 44, date(2024, 2, 5)),
        ];
        // Current total: (400 + 440) * 1.15 = 966.00; target 1150.00
        let outcome = refine_to_target(&mut invoices, &mut store, &cfg, &quarter());

        assert!(outcome.final_variance.abs() <= dec!(0.10));
        // Units were added on the Thursday invoice
        assert!(invoices[0].lines[0].quantity > 40);
        assert_eq!(invoices[1].lines[0].quantity, 44);
        // Inventory reflects the added units
        let total_units: u32 = invoices.iter().flat_map(|i| &i.lines).map(|l| l.quantity).sum();
        assert_eq!(
            store.lot("D1:Tea").unwrap().qty_remaining,
            1000 - total_units
        );
    }

    #[test]
    fn over_target_removes_units_on_slow_days() {
        let mut store = LotStore::load(vec![lot("D1", dec!(10.00), 1000)]).unwrap();
        let cfg = EngineConfig::default();
        let mut invoices = vec![
            invoice_with(&mut store, "D1:Tea", 40, date(2024, 2, 1)), // Thu
            invoice_with(&mut store, "D1:Tea", 64, date(2024, 2, 5)), // Mon
        ];
        // Current total: (400 + 640) * 1.15 = 1196.00; target 1150.00
        let outcome = refine_to_target(&mut invoices, &mut store, &cfg, &quarter());

        assert!(outcome.final_variance.abs() <= dec!(0.10));
        assert_eq!(invoices[0].lines[0].quantity, 40);
        assert!(invoices[1].lines[0].quantity < 64);
    }

    #[test]
    fn tax_invoices_are_never_adjusted() {
        let mut store = LotStore::load(vec![lot("D1", dec!(10.00), 1000)]).unwrap();
        let cfg = EngineConfig::default();
        let mut tax = invoice_with(&mut store, "D1:Tea", 40, date(2024, 2, 1));
        tax.kind = InvoiceKind::Tax;
        let before = tax.clone();
        let mut invoices = vec![tax];

        refine_to_target(&mut invoices, &mut store, &cfg, &quarter());
        assert_eq!(invoices[0], before);
    }

    #[test]
    fn refinement_respects_lot_stock() {
        // Lot fully sold; nothing can be added.
        let mut store = LotStore::load(vec![lot("D1", dec!(10.00), 40)]).unwrap();
        let cfg = EngineConfig::default();
        let mut invoices = vec![invoice_with(&mut store, "D1:Tea", 40, date(2024, 2, 1))];

        let outcome = refine_to_target(&mut invoices, &mut store, &cfg, &quarter());
        assert_eq!(invoices[0].lines[0].quantity, 40);
        assert_eq!(outcome.final_variance, dec!(690.00));
    }
}
