//! tally-ledger
//!
//! Daily position & portfolio accounting for backtests.
//! - Single-instrument positions and multi-leg baskets
//! - Split / dividend adjusted cost basis
//! - Per-share commission on every share-count change
//! - Daily P&L (long/short), gross exposure and turnover aggregation
//! - Pure deterministic logic (no IO, no wall clock, no shared state)

mod error;
mod holding;
mod numeric;
mod types;

pub mod multi_leg;
pub mod portfolio;
pub mod position;

pub use error::LedgerError;
pub use holding::Holding;
pub use multi_leg::{BasketState, BasketTarget, MultiLegPosition};
pub use numeric::{is_valid_price, safe_ratio, truncate_shares, MAX_SHARES};
pub use portfolio::Portfolio;
pub use position::Position;
pub use types::{
    DailyPl, DailyRecord, Direction, LedgerConfig, MarketDay, PriceMap, Settlement, TargetDay,
};

/// Helper to build a [`PriceMap`] with minimal boilerplate.
pub fn prices<I, S>(items: I) -> PriceMap
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    let mut m = PriceMap::new();
    for (sym, px) in items {
        m.insert(sym.into(), px);
    }
    m
}
