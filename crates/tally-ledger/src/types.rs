use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Canonical price map type (identifier -> price). `NaN` marks a missing price.
pub type PriceMap = BTreeMap<String, f64>;

/// Direction of a holding, derived from the sign of its shares.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
    Flat,
}

impl Direction {
    pub fn of(shares: i64) -> Self {
        match shares.signum() {
            1 => Direction::Long,
            -1 => Direction::Short,
            _ => Direction::Flat,
        }
    }
}

/// Ledger-wide sizing and cost parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LedgerConfig {
    /// Commission in dollars per share traded.
    pub commission_per_share: f64,
    /// Relative gross-exposure deviation a basket tolerates before rebalancing.
    pub rebalance_tolerance: f64,
    /// Open zero-cost placeholders for priced but unsized identifiers.
    pub track_unsized: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            commission_per_share: 0.005,
            rebalance_tolerance: 0.05,
            track_unsized: true,
        }
    }
}

/// One simulated day of prices and corporate actions.
///
/// Lookups apply the feed defaults: a symbol without a close is missing
/// (`NaN`), without a dividend pays 0, without a split has multiplier 1.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketDay {
    pub date: NaiveDate,
    pub closes: PriceMap,
    pub dividends: PriceMap,
    pub splits: PriceMap,
}

impl MarketDay {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            closes: PriceMap::new(),
            dividends: PriceMap::new(),
            splits: PriceMap::new(),
        }
    }

    pub fn with_close(mut self, symbol: impl Into<String>, close: f64) -> Self {
        self.closes.insert(symbol.into(), close);
        self
    }

    pub fn with_dividend(mut self, symbol: impl Into<String>, dividend: f64) -> Self {
        self.dividends.insert(symbol.into(), dividend);
        self
    }

    pub fn with_split(mut self, symbol: impl Into<String>, multiplier: f64) -> Self {
        self.splits.insert(symbol.into(), multiplier);
        self
    }

    pub fn close(&self, symbol: &str) -> f64 {
        self.closes.get(symbol).copied().unwrap_or(f64::NAN)
    }

    pub fn dividend(&self, symbol: &str) -> f64 {
        self.dividends.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn split(&self, symbol: &str) -> f64 {
        self.splits.get(symbol).copied().unwrap_or(1.0)
    }
}

/// Target sizes for one day plus the prices the rebalance executes at.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetDay<T> {
    pub date: NaiveDate,
    pub sizes: BTreeMap<String, T>,
    pub exec_prices: PriceMap,
}

impl<T> TargetDay<T> {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            sizes: BTreeMap::new(),
            exec_prices: PriceMap::new(),
        }
    }

    pub fn with_target(mut self, id: impl Into<String>, target: T) -> Self {
        self.sizes.insert(id.into(), target);
        self
    }

    pub fn with_exec_price(mut self, symbol: impl Into<String>, price: f64) -> Self {
        self.exec_prices.insert(symbol.into(), price);
        self
    }
}

/// Daily P&L split by the direction of the holding that produced it.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DailyPl {
    pub long: f64,
    pub short: f64,
}

impl DailyPl {
    pub fn total(&self) -> f64 {
        self.long + self.short
    }

    /// Book `amount` on the side given by `direction` (flat books long).
    pub fn book(&mut self, direction: Direction, amount: f64) {
        match direction {
            Direction::Short => self.short += amount,
            Direction::Long | Direction::Flat => self.long += amount,
        }
    }

    pub fn accumulate(&mut self, other: DailyPl) {
        self.long += other.long;
        self.short += other.short;
    }
}

/// Unsettled daily accumulators moved out of a holding.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Settlement {
    pub pl: DailyPl,
    pub turnover: f64,
}

impl Settlement {
    pub fn absorb(&mut self, other: Settlement) {
        self.pl.accumulate(other.pl);
        self.turnover += other.turnover;
    }
}

/// Per-date ledger output.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub pl_long: f64,
    pub pl_short: f64,
    /// Gross exposure (Σ|exposure|) at settlement.
    pub exposure: f64,
    pub turnover: f64,
}

impl DailyRecord {
    pub fn pl(&self) -> f64 {
        self.pl_long + self.pl_short
    }
}
