//! Engine-level errors. Recoverable stock and profitability events never
//! reach this type; they are counted in the run summary instead.

use daftar_core::quarter::TargetError;
use daftar_inventory::StockError;
use thiserror::Error;

/// Fatal engine errors, raised before or during a run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `weighted_avg` pricing without the explicit opt-in flag.
    #[error("weighted_avg pricing requires allow_weighted_avg = true")]
    DisallowedPricingPolicy,
    /// Weighted-average pricing is accepted by configuration but has no
    /// implementation; per-lot pricing is the only supported policy.
    #[error("weighted_avg pricing is not implemented; use lot_price")]
    UnsupportedPricingPolicy,
    /// A declared quarter target is internally inconsistent.
    #[error(transparent)]
    Target(#[from] TargetError),
    /// The lot catalog could not be loaded (duplicate lot ids).
    #[error(transparent)]
    Stock(#[from] StockError),
    /// No quarter targets were supplied.
    #[error("no quarter targets configured")]
    NoTargets,
}
