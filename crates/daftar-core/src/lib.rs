//! Core types for daftar
//!
//! This crate provides the fundamental types used throughout the daftar
//! project:
//!
//! - [`money`] - Scale-2 decimal helpers for the money path
//! - [`calendar`] - Working-day and Hijri calendar predicates
//! - [`Lot`] / [`Classification`] - The atomic inventory unit and its tag
//! - [`Invoice`] / [`InvoiceLine`] - Synthesized sale records
//! - [`Customer`] / [`Seller`] - Parties on a tax invoice
//! - [`QuarterTarget`] - Declared quarterly totals to reconcile against
//! - [`tlv`] - TLV/Base64 QR payload for simplified invoices
//!
//! # Example
//!
//! ```
//! use daftar_core::{Classification, Lot};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let lot = Lot::new(
//!     "10233004466",
//!     "Instant coffee 200g",
//!     Classification::NonExcInspection,
//!     NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
//!     500,
//!     dec!(8.00),
//!     dec!(10.00),
//! );
//! assert_eq!(lot.lot_id, "10233004466:Instant coffee 200g");
//! assert!(lot.is_profitable());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod calendar;
pub mod invoice;
pub mod lot;
pub mod money;
pub mod party;
pub mod quarter;
pub mod tlv;

pub use invoice::{Buyer, Invoice, InvoiceKind, InvoiceLine};
pub use lot::{Classification, Lot};
pub use party::{Customer, Seller};
pub use quarter::QuarterTarget;

// Re-export commonly used external types
pub use chrono::{NaiveDate, NaiveDateTime};
pub use rust_decimal::Decimal;
