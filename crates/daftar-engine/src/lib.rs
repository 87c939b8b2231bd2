//! Sales simulation and quarterly alignment for daftar.
//!
//! The engine turns a lot catalog, a B2B customer roster, a holiday list,
//! and declared quarterly totals into a deterministic invoice stream:
//!
//! - [`composer`] - basket composition under classification rules
//! - [`simulator`] - calendar-shaped cash-invoice generation
//! - [`b2b`] - exact-amount tax-invoice fulfilment
//! - [`refine`] - ±1-quantity convergence toward declared totals
//! - [`Engine`] - the per-quarter state machine and run orchestration
//!
//! All randomness routes through one generator seeded from
//! [`EngineConfig::random_seed`]; identical inputs and seed produce an
//! identical ledger.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aligner;
pub mod b2b;
pub mod composer;
pub mod config;
pub mod error;
pub mod refine;
pub mod simulator;
pub mod summary;
pub mod weights;

pub use aligner::{Engine, Ledger};
pub use b2b::{DeferReason, DeferredPurchase};
pub use config::{EngineConfig, PricingPolicy};
pub use error::EngineError;
pub use refine::RefineOutcome;
pub use summary::{EventCounters, QuarterOutcome, QuarterStatus, RunSummary};
