//! B2B fulfilment: one tax invoice per customer purchase, at its exact
//! inc-VAT amount.

use crate::composer::compose_tax_basket;
use crate::config::EngineConfig;
use crate::summary::EventCounters;
use crate::weights::sale_time;
use daftar_core::money::{net_of, vat_of};
use daftar_core::{Buyer, Customer, Invoice, InvoiceKind, QuarterTarget};
use daftar_inventory::LotStore;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a B2B purchase was not fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferReason {
    /// Dropped by the overshoot guard: fulfilling it would put the quarter
    /// out of reach from above.
    OvershootGuard,
    /// Inspected stock could not cover the exact amount without selling
    /// below cost.
    InsufficientStock,
    /// The inc-VAT amount does not split consistently at scale 2
    /// (`amount − round2(amount/1.15)` is not the VAT of the back-out).
    InconsistentVatBackOut,
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OvershootGuard => write!(f, "overshoot guard"),
            Self::InsufficientStock => write!(f, "insufficient stock"),
            Self::InconsistentVatBackOut => write!(f, "inconsistent VAT back-out"),
        }
    }
}

/// A purchase that produced no invoice, with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredPurchase {
    /// The untouched customer record.
    pub customer: Customer,
    /// Why it deferred.
    pub reason: DeferReason,
}

/// Result of the B2B phase for one quarter.
#[derive(Debug, Default)]
pub struct B2bPhase {
    /// Fulfilled tax invoices, in roster order.
    pub invoices: Vec<Invoice>,
    /// Deferred purchases, in roster order.
    pub deferred: Vec<DeferredPurchase>,
}

/// Fulfil every B2B purchase dated inside the quarter.
///
/// When the summed purchases exceed the declared quarter total, only the
/// largest roster-order prefix whose cumulative subtotal stays at or under
/// 95% of `sales_ex_vat` is fulfilled; the rest defer.
pub fn fulfil_quarter(
    store: &mut LotStore,
    cfg: &EngineConfig,
    rng: &mut StdRng,
    target: &QuarterTarget,
    customers: &[Customer],
    events: &mut EventCounters,
) -> B2bPhase {
    let in_period: Vec<&Customer> = customers
        .iter()
        .filter(|c| target.contains(c.purchase_date))
        .collect();

    let mut phase = B2bPhase::default();
    let summed: Decimal = in_period.iter().map(|c| c.purchase_amount_inc_vat).sum();
    let guard_cap = target.sales_ex_vat * dec!(0.95);

    let mut cumulative = Decimal::ZERO;
    let mut guard_tripped = false;
    for customer in in_period {
        if summed > target.sales_inc_vat && !guard_tripped {
            let subtotal = net_of(customer.purchase_amount_inc_vat, cfg.vat_rate);
            if cumulative + subtotal > guard_cap {
                guard_tripped = true;
            } else {
                cumulative += subtotal;
            }
        }
        if guard_tripped {
            tracing::warn!(
                customer = %customer.name,
                amount = %customer.purchase_amount_inc_vat,
                "purchase deferred by overshoot guard"
            );
            phase.deferred.push(DeferredPurchase {
                customer: customer.clone(),
                reason: DeferReason::OvershootGuard,
            });
            continue;
        }

        match fulfil_purchase(store, cfg, rng, customer, events) {
            Ok(invoice) => phase.invoices.push(invoice),
            Err(reason) => {
                tracing::warn!(
                    customer = %customer.name,
                    amount = %customer.purchase_amount_inc_vat,
                    %reason,
                    "purchase deferred"
                );
                phase.deferred.push(DeferredPurchase {
                    customer: customer.clone(),
                    reason,
                });
            }
        }
    }
    phase
}

/// Emit one tax invoice matching the purchase amount exactly.
fn fulfil_purchase(
    store: &mut LotStore,
    cfg: &EngineConfig,
    rng: &mut StdRng,
    customer: &Customer,
    events: &mut EventCounters,
) -> Result<Invoice, DeferReason> {
    let amount = customer.purchase_amount_inc_vat;
    let subtotal = net_of(amount, cfg.vat_rate);
    let vat = amount - subtotal;
    if vat != vat_of(subtotal, cfg.vat_rate) {
        return Err(DeferReason::InconsistentVatBackOut);
    }

    let lines = compose_tax_basket(store, cfg, rng, customer.purchase_date, subtotal, events)
        .ok_or(DeferReason::InsufficientStock)?;

    let mut invoice = Invoice::new(
        InvoiceKind::Tax,
        sale_time(customer.purchase_date, rng),
        Buyer::Business(customer.clone()),
    );
    invoice.lines = lines;
    invoice.recompute_totals(cfg.vat_rate);
    debug_assert_eq!(invoice.total, amount);
    Ok(invoice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use daftar_core::{Classification, Lot};
    use rand::SeedableRng;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn inspected_lot(decl: &str, price: Decimal, qty: u32) -> Lot {
        Lot::new(
            decl,
            "Rice 5kg",
            Classification::NonExcInspection,
            date(2024, 1, 1),
            qty,
            price / dec!(2),
            price,
        )
    }

    fn customer(name: &str, amount: Decimal, day: NaiveDate) -> Customer {
        Customer {
            name: name.to_string(),
            vat_number: "0311111111100003".to_string(),
            address: "Riyadh".to_string(),
            purchase_amount_inc_vat: amount,
            purchase_date: day,
        }
    }

    fn q1() -> QuarterTarget {
        QuarterTarget {
            label: "Q1-2024".to_string(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 3, 31),
            sales_ex_vat: dec!(916376.73),
            vat_amount: dec!(137456.51),
            sales_inc_vat: dec!(1053833.24),
            strict: true,
        }
    }

    #[test]
    fn exact_match_invoice() {
        let mut store =
            LotStore::load(vec![inspected_lot("D1", dec!(10.00), 50_000)]).unwrap();
        let cfg = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut events = EventCounters::default();

        let phase = fulfil_quarter(
            &mut store,
            &cfg,
            &mut rng,
            &q1(),
            &[customer("Al Noor Trading", dec!(23000.00), date(2024, 3, 12))],
            &mut events,
        );

        assert_eq!(phase.invoices.len(), 1);
        assert!(phase.deferred.is_empty());
        let invoice = &phase.invoices[0];
        assert_eq!(invoice.kind, InvoiceKind::Tax);
        assert_eq!(invoice.date(), date(2024, 3, 12));
        assert_eq!(invoice.subtotal, dec!(20000.00));
        assert_eq!(invoice.vat_amount, dec!(3000.00));
        assert_eq!(invoice.total, dec!(23000.00));
        assert!(invoice
            .lines
            .iter()
            .all(|l| l.classification == Classification::NonExcInspection));
    }

    #[test]
    fn out_of_period_purchases_ignored() {
        let mut store =
            LotStore::load(vec![inspected_lot("D1", dec!(10.00), 50_000)]).unwrap();
        let cfg = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut events = EventCounters::default();

        let phase = fulfil_quarter(
            &mut store,
            &cfg,
            &mut rng,
            &q1(),
            &[customer("Later Co", dec!(11500.00), date(2024, 5, 2))],
            &mut events,
        );
        assert!(phase.invoices.is_empty());
        assert!(phase.deferred.is_empty());
    }

    #[test]
    fn stockless_purchase_defers() {
        let mut store = LotStore::load(vec![inspected_lot("D1", dec!(10.00), 5)]).unwrap();
        let cfg = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut events = EventCounters::default();

        let phase = fulfil_quarter(
            &mut store,
            &cfg,
            &mut rng,
            &q1(),
            &[customer("Big Buyer", dec!(23000.00), date(2024, 3, 12))],
            &mut events,
        );
        assert!(phase.invoices.is_empty());
        assert_eq!(phase.deferred.len(), 1);
        assert_eq!(phase.deferred[0].reason, DeferReason::InsufficientStock);
        // Rollback left the lot whole
        assert_eq!(store.lot("D1:Rice 5kg").unwrap().qty_remaining, 5);
    }

    #[test]
    fn overshoot_guard_takes_prefix_only() {
        let mut store =
            LotStore::load(vec![inspected_lot("D1", dec!(10.00), 10_000_000)]).unwrap();
        let cfg = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut events = EventCounters::default();

        let target = QuarterTarget {
            label: "Q3-2024".to_string(),
            period_start: date(2024, 7, 1),
            period_end: date(2024, 9, 30),
            sales_ex_vat: dec!(674969.57),
            vat_amount: dec!(101245.43),
            sales_inc_vat: dec!(776215.00),
            strict: true,
        };
        // Summed B2B = 1,475,565 > 776,215: only the prefix under
        // 0.95 × 674,969.57 = 641,221.09 ex VAT survives.
        let roster = vec![
            customer("C1", dec!(345000.00), date(2024, 7, 10)), // 300,000.00 ex
            customer("C2", dec!(345000.00), date(2024, 8, 10)), // 600,000.00 ex
            customer("C3", dec!(345000.00), date(2024, 8, 20)), // would pass 641k
            customer("C4", dec!(440565.00), date(2024, 9, 5)),
        ];

        let phase = fulfil_quarter(&mut store, &cfg, &mut rng, &target, &roster, &mut events);
        assert_eq!(phase.invoices.len(), 2);
        assert_eq!(phase.deferred.len(), 2);
        assert!(phase
            .deferred
            .iter()
            .all(|d| d.reason == DeferReason::OvershootGuard));
        let fulfilled: Decimal = phase.invoices.iter().map(|i| i.subtotal).sum();
        assert!(fulfilled <= dec!(641221.09));
    }
}
