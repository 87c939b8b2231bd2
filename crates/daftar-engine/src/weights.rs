//! Calendar and popularity weights that shape the cash-invoice stream.
//!
//! Weights are plain `f64` multipliers feeding the random draws; they never
//! touch ledger arithmetic, which stays on `Decimal`.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use daftar_core::calendar::{at_time, days_between, is_ramadan, is_shaaban};
use daftar_core::{Classification, Lot};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;

/// Hourly trading-floor profile, 09:00 through 21:59, with lunch and
/// early-evening peaks.
pub const HOUR_WEIGHTS: [(u32, f64); 13] = [
    (9, 0.3),
    (10, 0.5),
    (11, 0.8),
    (12, 1.2),
    (13, 1.5),
    (14, 1.0),
    (15, 0.8),
    (16, 0.9),
    (17, 1.3),
    (18, 1.8),
    (19, 1.5),
    (20, 1.0),
    (21, 0.6),
];

/// Relative likelihood of sales on `date`.
///
/// Combines day-of-week, salary-day spikes, Hijri seasonal boosts, and the
/// end-of-quarter push. Fridays weigh zero (they are excluded upstream by the
/// working-day filter anyway).
#[must_use]
pub fn day_weight(date: NaiveDate, period_end: NaiveDate) -> f64 {
    let mut weight = match date.weekday() {
        Weekday::Thu => 1.5,
        Weekday::Sat => 1.3,
        Weekday::Sun => 1.2,
        Weekday::Fri => return 0.0,
        _ => 1.0,
    };

    weight *= match date.day() {
        27 => 1.5,
        1 => 1.2,
        10 => 1.1,
        _ => 1.0,
    };

    if is_ramadan(date) {
        weight *= 2.5;
    } else if is_shaaban(date) {
        weight *= 2.0;
    }

    let days_to_end = days_between(date, period_end);
    if days_to_end <= 7 {
        weight *= 1.8;
    } else if days_to_end <= 14 {
        weight *= 1.4;
    }

    weight
}

/// Days refinement treats as peaks: Thursday, Saturday, the salary window
/// (25th–28th), and the final week of the quarter.
#[must_use]
pub fn is_peak_day(date: NaiveDate, period_end: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Thu | Weekday::Sat)
        || (25..=28).contains(&date.day())
        || days_between(date, period_end) <= 7
}

/// Relative likelihood of a lot appearing in a basket.
///
/// Cheap items and deeply stocked lots move faster; goods outside inspection
/// move fastest of the three classifications.
#[must_use]
pub fn lot_weight(lot: &Lot) -> f64 {
    let price = lot.unit_price_ex_vat.to_f64().unwrap_or(0.0);
    let mut weight = if price < 10.0 {
        2.5
    } else if price < 20.0 {
        2.0
    } else if price < 50.0 {
        1.5
    } else if price < 100.0 {
        1.0
    } else {
        0.5
    };

    weight *= match lot.qty_remaining {
        q if q > 1000 => 1.8,
        q if q > 500 => 1.5,
        q if q > 200 => 1.2,
        q if q > 50 => 1.0,
        _ => 0.7,
    };

    weight *= match lot.classification {
        Classification::NonExcOutside => 1.3,
        Classification::NonExcInspection => 1.1,
        Classification::ExcInspection => 1.0,
    };

    weight
}

/// Pick an index by weight. Returns `None` when the slice is empty or all
/// weights vanish (the caller falls back to uniform or gives up).
pub fn pick_weighted(weights: &[f64], rng: &mut StdRng) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().copied().filter(|w| *w > 0.0).sum();
    if total <= 0.0 {
        return Some(rng.gen_range(0..weights.len()));
    }
    let mut roll = rng.gen_range(0.0..total);
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        if roll < w {
            return Some(i);
        }
        roll -= w;
    }
    // Floating-point tail: land on the last positive weight.
    weights.iter().rposition(|&w| w > 0.0)
}

/// A weighted sale timestamp on `date`, inside trading hours.
pub fn sale_time(date: NaiveDate, rng: &mut StdRng) -> NaiveDateTime {
    let weights: Vec<f64> = HOUR_WEIGHTS.iter().map(|&(_, w)| w).collect();
    let idx = pick_weighted(&weights, rng).unwrap_or(0);
    let hour = HOUR_WEIGHTS[idx].0;
    let minute = rng.gen_range(0..60);
    at_time(date, hour, minute)
}
