//! Basket composition: turning a size hint into `(lot, qty)` lines.
//!
//! Composition rules:
//! - excise lots are exclusive and appear only on simplified invoices;
//! - tax invoices draw from inspected non-excise lots only;
//! - a lot never appears twice in one invoice;
//! - stock is checked and deducted per line, with bounded retries.

use crate::config::EngineConfig;
use crate::summary::EventCounters;
use crate::weights::{lot_weight, pick_weighted};
use chrono::NaiveDate;
use daftar_core::money::line_subtotal;
use daftar_core::{Classification, InvoiceLine, Lot};
use daftar_inventory::{LotStore, StockError};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

/// How far past the remaining target a cash line may reach.
fn overshoot_allowance() -> Decimal {
    dec!(100.00)
}

/// Filter a pool down to selectable lots: unused, passing `extra`, and never
/// priced below cost. Below-cost lots are counted as profitability skips.
fn eligible_pool(
    pool: Vec<&Lot>,
    used: &HashSet<String>,
    extra: impl Fn(&Lot) -> bool,
    events: &mut EventCounters,
) -> Vec<Lot> {
    let mut eligible = Vec::new();
    for lot in pool {
        if !extra(lot) || used.contains(&lot.lot_id) {
            continue;
        }
        if !lot.is_profitable() {
            events.profitability_skips += 1;
            continue;
        }
        eligible.push(lot.clone());
    }
    eligible
}

/// Per-invoice stopping tolerance for cash baskets.
fn basket_close_enough() -> Decimal {
    dec!(1.00)
}

/// Compose a simplified-invoice basket aiming at `target_subtotal`.
///
/// Roughly one in five simplified invoices is excise-exclusive (a single
/// line from an excise lot); the rest mix inspected and outside-inspection
/// lots, weighted by popularity. Returns an empty vec when no line could be
/// placed.
pub fn compose_cash_basket(
    store: &mut LotStore,
    cfg: &EngineConfig,
    rng: &mut StdRng,
    date: NaiveDate,
    target_subtotal: Decimal,
    events: &mut EventCounters,
) -> Vec<InvoiceLine> {
    if rng.gen_bool(cfg.excise_exclusive_ratio.clamp(0.0, 1.0)) {
        if let Some(line) = excise_exclusive_line(store, cfg, rng, date, events) {
            return vec![line];
        }
    }

    let line_target = rng.gen_range(cfg.min_lines()..=cfg.max_lines()) as usize;
    let mut used: HashSet<String> = HashSet::new();
    let mut lines: Vec<InvoiceLine> = Vec::new();
    let mut remaining = target_subtotal;

    for _ in 0..cfg.basket_attempt_cap {
        if lines.len() >= line_target || remaining <= basket_close_enough() {
            break;
        }
        let candidates = eligible_pool(
            store.available_lots(date, None),
            &used,
            |l| l.classification != Classification::ExcInspection,
            events,
        );
        if candidates.is_empty() {
            break;
        }
        let weights: Vec<f64> = candidates.iter().map(lot_weight).collect();
        let Some(idx) = pick_weighted(&weights, rng) else {
            break;
        };
        let picked = &candidates[idx];
        used.insert(picked.lot_id.clone());

        let Some(qty) = cash_line_quantity(picked, remaining, cfg) else {
            events.basket_retries += 1;
            continue;
        };
        match store.deduct(&picked.lot_id, qty) {
            Ok(_) => {
                let line = InvoiceLine::new(picked, qty);
                remaining -= line.line_subtotal;
                lines.push(line);
            }
            Err(_) => events.insufficient_stock += 1,
        }
    }

    lines
}

/// Quantity for one cash line: target-derived, clamped to the configured
/// per-line bounds and the lot's stock, refused when it would overshoot.
fn cash_line_quantity(lot: &Lot, remaining: Decimal, cfg: &EngineConfig) -> Option<u32> {
    let price = lot.unit_price_ex_vat;
    if price <= Decimal::ZERO {
        return None;
    }
    let ideal = (remaining / price).floor().to_u32().unwrap_or(0);
    let qty = ideal
        .clamp(cfg.min_qty(), cfg.max_qty())
        .min(lot.qty_remaining);
    if qty < cfg.min_qty() {
        return None;
    }
    if line_subtotal(price, qty) > remaining + overshoot_allowance() {
        return None;
    }
    Some(qty)
}

/// One excise lot, one line, quantity from a descending ladder.
fn excise_exclusive_line(
    store: &mut LotStore,
    cfg: &EngineConfig,
    rng: &mut StdRng,
    date: NaiveDate,
    events: &mut EventCounters,
) -> Option<InvoiceLine> {
    let pool = eligible_pool(
        store.available_lots(date, Some(Classification::ExcInspection)),
        &HashSet::new(),
        |_| true,
        events,
    );
    if pool.is_empty() {
        return None;
    }
    let weights: Vec<f64> = pool.iter().map(lot_weight).collect();
    let idx = pick_weighted(&weights, rng)?;
    let lot = &pool[idx];

    let ladder = [cfg.max_qty(), 30, 20, 10, 5, cfg.min_qty()];
    for &qty in &ladder {
        if qty == 0 || qty > lot.qty_remaining {
            continue;
        }
        match store.deduct(&lot.lot_id, qty) {
            Ok(_) => return Some(InvoiceLine::new(lot, qty)),
            Err(_) => {
                events.insufficient_stock += 1;
                return None;
            }
        }
    }
    events.basket_retries += 1;
    None
}

/// Compose a tax-invoice basket whose line subtotals sum to exactly
/// `target_subtotal`.
///
/// Greedy fill from inspected non-excise lots, then an exact closing line
/// whose `round2(price × qty)` equals the residue. On failure every
/// deduction is rolled back and `None` is returned (the purchase defers).
pub fn compose_tax_basket(
    store: &mut LotStore,
    cfg: &EngineConfig,
    rng: &mut StdRng,
    date: NaiveDate,
    target_subtotal: Decimal,
    events: &mut EventCounters,
) -> Option<Vec<InvoiceLine>> {
    let mut used: HashSet<String> = HashSet::new();
    let mut lines: Vec<InvoiceLine> = Vec::new();
    let mut remaining = target_subtotal;

    for _ in 0..cfg.basket_attempt_cap {
        if remaining.is_zero() {
            break;
        }
        let threshold = remaining;
        let candidates = eligible_pool(
            store.available_lots(date, Some(Classification::NonExcInspection)),
            &used,
            |l| l.unit_price_ex_vat > Decimal::ZERO && l.unit_price_ex_vat <= threshold,
            events,
        );
        if candidates.is_empty() {
            break;
        }
        let weights: Vec<f64> = candidates.iter().map(lot_weight).collect();
        let Some(idx) = pick_weighted(&weights, rng) else {
            break;
        };
        let picked = &candidates[idx];
        used.insert(picked.lot_id.clone());

        let qty = (remaining / picked.unit_price_ex_vat)
            .floor()
            .to_u32()
            .unwrap_or(0)
            .min(picked.qty_remaining);
        if qty == 0 {
            events.basket_retries += 1;
            continue;
        }
        match store.deduct(&picked.lot_id, qty) {
            Ok(_) => {
                let line = InvoiceLine::new(picked, qty);
                remaining -= line.line_subtotal;
                lines.push(line);
            }
            Err(_) => events.insufficient_stock += 1,
        }
    }

    // Close the residue with a line whose subtotal matches it exactly. When
    // no price divides the residue, back off the last adjustable line one
    // unit at a time; each step shifts the residue by that line's price and
    // opens a new divisibility window.
    for _ in 0..cfg.basket_attempt_cap {
        if remaining.is_zero() {
            break;
        }
        if let Some(line) = exact_closing_line(store, date, remaining, &used) {
            used.insert(line.lot_id.clone());
            remaining -= line.line_subtotal;
            lines.push(line);
            break;
        }
        let Some(last) = lines.iter_mut().rev().find(|l| l.quantity > 1) else {
            break;
        };
        let _ = store.restore(&last.lot_id, 1);
        last.set_quantity(last.quantity - 1);
        remaining += last.unit_price_ex_vat;
    }

    if remaining.is_zero() && !lines.is_empty() {
        Some(lines)
    } else {
        // Lines reflect every unit still held; give them all back.
        for line in &lines {
            let _ = store.restore(&line.lot_id, line.quantity);
        }
        None
    }
}

/// Find an unused inspected lot whose price divides the residue exactly at
/// scale 2, scanning in FIFO order for determinism.
fn exact_closing_line(
    store: &mut LotStore,
    date: NaiveDate,
    residue: Decimal,
    used: &HashSet<String>,
) -> Option<InvoiceLine> {
    let mut pool: Vec<Lot> = store
        .available_lots(date, Some(Classification::NonExcInspection))
        .into_iter()
        .filter(|l| !used.contains(&l.lot_id))
        .filter(|l| l.is_profitable() && l.unit_price_ex_vat > Decimal::ZERO)
        .cloned()
        .collect();
    pool.sort_by(|a, b| {
        (a.stock_date, a.import_date, &a.lot_id).cmp(&(b.stock_date, b.import_date, &b.lot_id))
    });

    for lot in pool {
        let q = residue / lot.unit_price_ex_vat;
        if q < Decimal::ONE || !q.fract().is_zero() {
            continue;
        }
        let Some(qty) = q.to_u32() else { continue };
        if qty > lot.qty_remaining {
            continue;
        }
        if line_subtotal(lot.unit_price_ex_vat, qty) != residue {
            continue;
        }
        if store.deduct(&lot.lot_id, qty).is_ok() {
            return Some(InvoiceLine::new(&lot, qty));
        }
    }
    None
}

/// Build the lines for a fixed demand of one item, spanning lots FIFO.
///
/// Lots are never merged: each lot touched yields its own line with its own
/// price. Fails all-or-nothing when stock cannot cover the demand.
pub fn compose_item_demand(
    store: &mut LotStore,
    item_description: &str,
    quantity: u32,
    as_of: NaiveDate,
) -> Result<Vec<InvoiceLine>, StockError> {
    let deductions = store.deduct_fifo(item_description, quantity, as_of)?;
    let mut lines = Vec::with_capacity(deductions.len());
    for d in &deductions {
        let lot = store.lot(&d.lot_id).ok_or_else(|| StockError::UnknownLot {
            lot_id: d.lot_id.clone(),
        })?;
        lines.push(InvoiceLine::new(lot, d.qty_taken));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lot(
        decl: &str,
        item: &str,
        class: Classification,
        qty: u32,
        cost: Decimal,
        price: Decimal,
    ) -> Lot {
        Lot::new(decl, item, class, date(2024, 1, 1), qty, cost, price)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn two_lots_same_item_stay_separate_lines() {
        let mut store = LotStore::load(vec![
            lot("A", "X", Classification::NonExcInspection, 100, dec!(8.00), dec!(10.00)),
            lot("B", "X", Classification::NonExcInspection, 100, dec!(9.00), dec!(12.00)),
        ])
        .unwrap();

        let lines = compose_item_demand(&mut store, "X", 150, date(2024, 2, 1)).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].lot_id, "A:X");
        assert_eq!(lines[0].quantity, 100);
        assert_eq!(lines[0].unit_price_ex_vat, dec!(10.00));
        assert_eq!(lines[0].line_subtotal, dec!(1000.00));
        assert_eq!(lines[1].lot_id, "B:X");
        assert_eq!(lines[1].quantity, 50);
        assert_eq!(lines[1].unit_price_ex_vat, dec!(12.00));
        assert_eq!(lines[1].line_subtotal, dec!(600.00));
    }

    #[test]
    fn cash_basket_never_repeats_a_lot() {
        let lots: Vec<Lot> = (0..6)
            .map(|i| {
                lot(
                    &format!("D{i}"),
                    &format!("Item{i}"),
                    Classification::NonExcOutside,
                    500,
                    dec!(4.00),
                    dec!(6.00),
                )
            })
            .collect();
        let mut store = LotStore::load(lots).unwrap();
        let cfg = EngineConfig::default();
        let mut rng = rng();
        let mut events = EventCounters::default();

        for _ in 0..20 {
            let lines = compose_cash_basket(
                &mut store,
                &cfg,
                &mut rng,
                date(2024, 2, 1),
                dec!(800.00),
                &mut events,
            );
            let mut ids: Vec<&str> = lines.iter().map(|l| l.lot_id.as_str()).collect();
            let before = ids.len();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), before);
        }
    }

    #[test]
    fn excise_baskets_are_single_line() {
        let mut store = LotStore::load(vec![
            lot("E1", "Vape", Classification::ExcInspection, 400, dec!(20.00), dec!(30.00)),
            lot("N1", "Tea", Classification::NonExcInspection, 400, dec!(4.00), dec!(6.00)),
        ])
        .unwrap();
        let mut cfg = EngineConfig::default();
        cfg.excise_exclusive_ratio = 1.0; // force the excise roll
        let mut rng = rng();
        let mut events = EventCounters::default();

        let lines = compose_cash_basket(
            &mut store,
            &cfg,
            &mut rng,
            date(2024, 2, 1),
            dec!(2000.00),
            &mut events,
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].classification, Classification::ExcInspection);
    }

    #[test]
    fn below_cost_lots_are_skipped_and_counted() {
        // Priced below its 9.00 cost
        let loss_maker = lot(
            "L1",
            "Expired stock",
            Classification::NonExcOutside,
            1000,
            dec!(9.00),
            dec!(6.00),
        );
        let mut store = LotStore::load(vec![
            loss_maker,
            lot("N1", "Tea", Classification::NonExcOutside, 1000, dec!(4.00), dec!(6.00)),
        ])
        .unwrap();
        let cfg = EngineConfig::default();
        let mut rng = rng();
        let mut events = EventCounters::default();

        for _ in 0..10 {
            let lines = compose_cash_basket(
                &mut store,
                &cfg,
                &mut rng,
                date(2024, 2, 1),
                dec!(500.00),
                &mut events,
            );
            assert!(lines.iter().all(|l| l.lot_id != "L1:Expired stock"));
        }
        assert!(events.profitability_skips > 0);
    }

    #[test]
    fn tax_basket_hits_exact_subtotal() {
        let mut store = LotStore::load(vec![
            lot("N1", "Rice", Classification::NonExcInspection, 5000, dec!(8.00), dec!(10.00)),
            lot("N2", "Oil", Classification::NonExcInspection, 5000, dec!(5.50), dec!(7.25)),
        ])
        .unwrap();
        let cfg = EngineConfig::default();
        let mut rng = rng();
        let mut events = EventCounters::default();

        let lines = compose_tax_basket(
            &mut store,
            &cfg,
            &mut rng,
            date(2024, 2, 1),
            dec!(20000.00),
            &mut events,
        )
        .unwrap();
        let sum: Decimal = lines.iter().map(|l| l.line_subtotal).sum();
        assert_eq!(sum, dec!(20000.00));
        assert!(lines
            .iter()
            .all(|l| l.classification == Classification::NonExcInspection));
    }

    #[test]
    fn tax_basket_excludes_outside_inspection_lots() {
        let mut store = LotStore::load(vec![lot(
            "O1",
            "Candy",
            Classification::NonExcOutside,
            5000,
            dec!(1.00),
            dec!(2.00),
        )])
        .unwrap();
        let cfg = EngineConfig::default();
        let mut rng = rng();
        let mut events = EventCounters::default();

        let basket = compose_tax_basket(
            &mut store,
            &cfg,
            &mut rng,
            date(2024, 2, 1),
            dec!(100.00),
            &mut events,
        );
        assert!(basket.is_none());
        // Rollback left stock untouched
        assert_eq!(store.lot("O1:Candy").unwrap().qty_remaining, 5000);
    }

    #[test]
    fn failed_tax_basket_rolls_back_stock() {
        // Price 7.00 cannot close a residue of 20000.00 minus multiples of
        // 7.00 down to zero with the stock available.
        let mut store = LotStore::load(vec![lot(
            "N1",
            "Rice",
            Classification::NonExcInspection,
            10,
            dec!(5.00),
            dec!(7.00),
        )])
        .unwrap();
        let cfg = EngineConfig::default();
        let mut rng = rng();
        let mut events = EventCounters::default();

        let basket = compose_tax_basket(
            &mut store,
            &cfg,
            &mut rng,
            date(2024, 2, 1),
            dec!(20000.00),
            &mut events,
        );
        assert!(basket.is_none());
        assert_eq!(store.lot("N1:Rice").unwrap().qty_remaining, 10);
    }
}
