//! Lot-addressed FIFO inventory store.
//!
//! The store owns every [`Lot`] for the run and is the only mutable-during-run
//! resource. Deductions are transactional: a failed multi-lot FIFO deduction
//! leaves every lot untouched.
//!
//! # Example
//!
//! ```
//! use daftar_core::{Classification, Lot};
//! use daftar_inventory::LotStore;
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let lots = vec![
//!     Lot::new("D1", "Tea", Classification::NonExcInspection, date, 100, dec!(8.00), dec!(10.00)),
//!     Lot::new("D2", "Tea", Classification::NonExcInspection, date, 100, dec!(9.00), dec!(12.00)),
//! ];
//! let mut store = LotStore::load(lots).unwrap();
//!
//! let taken = store.deduct_fifo("Tea", 150, date).unwrap();
//! assert_eq!(taken.len(), 2);
//! assert_eq!(store.lot("D1:Tea").unwrap().qty_remaining, 0);
//! assert_eq!(store.lot("D2:Tea").unwrap().qty_remaining, 50);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::NaiveDate;
use daftar_core::{Classification, Lot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Error raised by stock operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StockError {
    /// The lot id is not in the store.
    #[error("unknown lot: {lot_id}")]
    UnknownLot {
        /// The missing lot id.
        lot_id: String,
    },
    /// A lot (or an item across its lots) cannot satisfy the requested
    /// quantity.
    #[error("insufficient stock for {subject}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Lot id or item description the request addressed.
        subject: String,
        /// Units requested.
        requested: u32,
        /// Units available.
        available: u32,
    },
    /// Restoring units would exceed the imported quantity.
    #[error("restore of {quantity} to {lot_id} exceeds imported quantity")]
    OverRestore {
        /// The lot id.
        lot_id: String,
        /// Units being restored.
        quantity: u32,
    },
    /// Two catalog rows produced the same lot id.
    #[error("duplicate lot id: {lot_id}")]
    DuplicateLot {
        /// The colliding lot id.
        lot_id: String,
    },
}

/// Record of units taken from one lot, with price/cost snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    /// The lot deducted from.
    pub lot_id: String,
    /// Units taken.
    pub qty_taken: u32,
    /// Lot unit price, ex VAT.
    pub unit_price_ex_vat: Decimal,
    /// Lot unit cost, ex VAT.
    pub unit_cost_ex_vat: Decimal,
}

/// Aggregate stock statistics, reported at run start and end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Total lots loaded.
    pub total_lots: usize,
    /// Lots with stock remaining.
    pub lots_with_stock: usize,
    /// Lots fully sold out.
    pub lots_depleted: usize,
    /// Units remaining across all lots.
    pub units_remaining: u64,
    /// Distinct item descriptions loaded.
    pub distinct_items: usize,
    /// Lots flagged unprofitable at load (excluded from selection).
    pub unprofitable_lots: usize,
}

/// The lot store: every lot of the import catalog, indexed by lot id.
#[derive(Debug, Clone)]
pub struct LotStore {
    lots: Vec<Lot>,
    index: HashMap<String, usize>,
}

impl LotStore {
    /// Ingest pre-parsed lots. `qty_remaining` is reset to `qty_imported`.
    ///
    /// Unprofitable lots are kept (they still appear in catalog cross-checks)
    /// but flagged via a warning; selection filters exclude them.
    pub fn load(mut lots: Vec<Lot>) -> Result<Self, StockError> {
        let mut index = HashMap::with_capacity(lots.len());
        for (i, lot) in lots.iter_mut().enumerate() {
            lot.qty_remaining = lot.qty_imported;
            if index.insert(lot.lot_id.clone(), i).is_some() {
                return Err(StockError::DuplicateLot {
                    lot_id: lot.lot_id.clone(),
                });
            }
            if !lot.is_profitable() {
                tracing::warn!(
                    lot_id = %lot.lot_id,
                    price = %lot.unit_price_ex_vat,
                    cost = %lot.unit_cost_ex_vat,
                    "lot priced below cost, excluded from selection"
                );
            }
        }
        Ok(Self { lots, index })
    }

    /// All lots, in load order.
    #[must_use]
    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    /// O(1) lookup by lot id.
    #[must_use]
    pub fn lot(&self, lot_id: &str) -> Option<&Lot> {
        self.index.get(lot_id).map(|&i| &self.lots[i])
    }

    /// All lots of an item with stock remaining, FIFO-ordered by
    /// `(stock_date, import_date)`.
    #[must_use]
    pub fn lots_for_item(&self, item_description: &str) -> Vec<&Lot> {
        let mut lots: Vec<&Lot> = self
            .lots
            .iter()
            .filter(|l| l.item_description == item_description && l.qty_remaining > 0)
            .collect();
        lots.sort_by_key(|l| (l.stock_date, l.import_date));
        lots
    }

    /// Lots with stock on `as_of`: activated and non-empty, optionally
    /// filtered by classification. Returned in load order. Profitability is
    /// the selection layer's concern, not the store's.
    #[must_use]
    pub fn available_lots(
        &self,
        as_of: NaiveDate,
        classification: Option<Classification>,
    ) -> Vec<&Lot> {
        self.lots
            .iter()
            .filter(|l| l.is_available(as_of))
            .filter(|l| classification.map_or(true, |c| l.classification == c))
            .collect()
    }

    /// True when any lot has stock on `as_of`.
    #[must_use]
    pub fn any_available(&self, as_of: NaiveDate) -> bool {
        self.lots.iter().any(|l| l.is_available(as_of))
    }

    /// Units of an item available on `as_of` across all activated lots.
    #[must_use]
    pub fn available_units(&self, item_description: &str, as_of: NaiveDate) -> u32 {
        self.lots
            .iter()
            .filter(|l| l.item_description == item_description && l.is_available(as_of))
            .map(|l| l.qty_remaining)
            .sum()
    }

    /// Decrement one lot's remaining quantity.
    pub fn deduct(&mut self, lot_id: &str, quantity: u32) -> Result<Deduction, StockError> {
        let idx = *self.index.get(lot_id).ok_or_else(|| StockError::UnknownLot {
            lot_id: lot_id.to_string(),
        })?;
        let lot = &mut self.lots[idx];
        if quantity > lot.qty_remaining {
            return Err(StockError::InsufficientStock {
                subject: lot_id.to_string(),
                requested: quantity,
                available: lot.qty_remaining,
            });
        }
        lot.qty_remaining -= quantity;
        Ok(Deduction {
            lot_id: lot.lot_id.clone(),
            qty_taken: quantity,
            unit_price_ex_vat: lot.unit_price_ex_vat,
            unit_cost_ex_vat: lot.unit_cost_ex_vat,
        })
    }

    /// Give units back to a lot (refinement undo path). Never exceeds
    /// `qty_imported`.
    pub fn restore(&mut self, lot_id: &str, quantity: u32) -> Result<(), StockError> {
        let idx = *self.index.get(lot_id).ok_or_else(|| StockError::UnknownLot {
            lot_id: lot_id.to_string(),
        })?;
        let lot = &mut self.lots[idx];
        if lot.qty_remaining + quantity > lot.qty_imported {
            return Err(StockError::OverRestore {
                lot_id: lot_id.to_string(),
                quantity,
            });
        }
        lot.qty_remaining += quantity;
        Ok(())
    }

    /// Deduct `quantity` units of an item across lots in FIFO order.
    ///
    /// All-or-nothing: availability on `as_of` is checked up front, and a
    /// failure leaves every lot untouched.
    pub fn deduct_fifo(
        &mut self,
        item_description: &str,
        quantity: u32,
        as_of: NaiveDate,
    ) -> Result<Vec<Deduction>, StockError> {
        let available = self.available_units(item_description, as_of);
        if available < quantity {
            return Err(StockError::InsufficientStock {
                subject: item_description.to_string(),
                requested: quantity,
                available,
            });
        }

        let mut fifo: Vec<usize> = (0..self.lots.len())
            .filter(|&i| {
                let l = &self.lots[i];
                l.item_description == item_description && l.is_available(as_of)
            })
            .collect();
        fifo.sort_by_key(|&i| (self.lots[i].stock_date, self.lots[i].import_date));

        let mut remaining = quantity;
        let mut deductions = Vec::new();
        for idx in fifo {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(self.lots[idx].qty_remaining);
            let lot_id = self.lots[idx].lot_id.clone();
            deductions.push(self.deduct(&lot_id, take)?);
            remaining -= take;
        }
        debug_assert_eq!(remaining, 0);
        Ok(deductions)
    }

    /// Aggregate stock statistics.
    #[must_use]
    pub fn summary(&self) -> StoreSummary {
        let lots_with_stock = self.lots.iter().filter(|l| l.qty_remaining > 0).count();
        let mut items: Vec<&str> = self
            .lots
            .iter()
            .map(|l| l.item_description.as_str())
            .collect();
        items.sort_unstable();
        items.dedup();
        StoreSummary {
            total_lots: self.lots.len(),
            lots_with_stock,
            lots_depleted: self.lots.len() - lots_with_stock,
            units_remaining: self.lots.iter().map(|l| u64::from(l.qty_remaining)).sum(),
            distinct_items: items.len(),
            unprofitable_lots: self.lots.iter().filter(|l| !l.is_profitable()).count(),
        }
    }

    /// Mutable access for load-time policy (activation delays). Not used
    /// during generation.
    pub fn lots_mut(&mut self) -> &mut [Lot] {
        &mut self.lots
    }
}
