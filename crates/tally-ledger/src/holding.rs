use crate::error::LedgerError;
use crate::multi_leg::{BasketTarget, MultiLegPosition};
use crate::position::Position;
use crate::types::{DailyPl, LedgerConfig, MarketDay, PriceMap};

/// Capability a [`crate::Portfolio`] needs from what it holds.
///
/// Implemented once for single-instrument [`Position`]s (target: signed
/// dollar exposure) and once for [`MultiLegPosition`] baskets (target: legs
/// plus per-leg dollar sizes).
pub trait Holding: Sized {
    /// What the strategy asks for per identifier and day.
    type Target;

    /// Open a new holding for `id` sized to `target`, trading at
    /// `exec_prices`.
    ///
    /// # Errors
    /// [`LedgerError::MissingExecutionPrice`] when a required symbol has no
    /// execution price at all (a `NaN` entry is a missing quote and opens
    /// nothing instead).
    fn open(
        id: &str,
        target: &Self::Target,
        exec_prices: &PriceMap,
        config: &LedgerConfig,
    ) -> Result<Self, LedgerError>;

    /// Zero-cost holding used to follow a price before the strategy sizes
    /// it. `None` when the holding kind does not support placeholders.
    fn placeholder(_symbol: &str, _price: f64, _config: &LedgerConfig) -> Option<Self> {
        None
    }

    fn is_zero_target(target: &Self::Target) -> bool;

    /// Whether `target` cannot be reached by resizing this holding and a
    /// fresh one must be opened instead.
    fn needs_reopen(&self, _target: &Self::Target) -> bool {
        false
    }

    fn update_prices(&mut self, day: &MarketDay);

    fn rebalance(&mut self, target: &Self::Target, exec_prices: &PriceMap)
        -> Result<(), LedgerError>;

    /// Whether the execution prices list this holding, so it can be unwound.
    /// An entry counts even when its value is unusable (`NaN`, non-positive).
    fn is_quoted(&self, exec_prices: &PriceMap) -> bool;

    /// Trade down to zero shares at the execution prices, falling back to
    /// the current mark for a symbol whose execution price is unusable.
    fn unwind(&mut self, exec_prices: &PriceMap);

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Total absolute shares held (across legs).
    fn share_count(&self) -> u64;

    fn gross_exposure(&self) -> f64;

    fn take_daily_pl(&mut self) -> DailyPl;

    fn take_daily_turnover(&mut self) -> f64;
}

impl Holding for Position {
    type Target = f64;

    fn open(
        id: &str,
        target: &f64,
        exec_prices: &PriceMap,
        config: &LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let price = exec_prices
            .get(id)
            .copied()
            .ok_or_else(|| LedgerError::MissingExecutionPrice {
                id: id.to_string(),
                symbol: id.to_string(),
                date: None,
            })?;
        Position::open(id, price, *target, config.commission_per_share)
    }

    fn placeholder(symbol: &str, price: f64, config: &LedgerConfig) -> Option<Self> {
        Some(Position::placeholder(symbol, price, config.commission_per_share))
    }

    fn is_zero_target(target: &f64) -> bool {
        *target == 0.0
    }

    fn update_prices(&mut self, day: &MarketDay) {
        let sym = self.symbol();
        let (close, dividend, split) = (day.close(sym), day.dividend(sym), day.split(sym));
        self.update_price(close, dividend, split);
    }

    fn rebalance(&mut self, target: &f64, exec_prices: &PriceMap) -> Result<(), LedgerError> {
        let price = exec_prices.get(self.symbol()).copied().unwrap_or(f64::NAN);
        self.rebalance_at(*target, price);
        Ok(())
    }

    fn is_quoted(&self, exec_prices: &PriceMap) -> bool {
        exec_prices.contains_key(self.symbol())
    }

    fn unwind(&mut self, exec_prices: &PriceMap) {
        let price = exec_prices.get(self.symbol()).copied().unwrap_or(f64::NAN);
        self.rebalance_at(0.0, price);
    }

    fn close(&mut self) {
        Position::close(self);
    }

    fn is_open(&self) -> bool {
        Position::is_open(self)
    }

    fn share_count(&self) -> u64 {
        self.shares().unsigned_abs()
    }

    fn gross_exposure(&self) -> f64 {
        self.exposure().abs()
    }

    fn take_daily_pl(&mut self) -> DailyPl {
        Position::take_daily_pl(self)
    }

    fn take_daily_turnover(&mut self) -> f64 {
        Position::take_daily_turnover(self)
    }
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

fn leg_prices(legs: &[&str], exec_prices: &PriceMap) -> Vec<f64> {
    legs.iter()
        .map(|leg| exec_prices.get(*leg).copied().unwrap_or(f64::NAN))
        .collect()
}

impl Holding for MultiLegPosition {
    type Target = BasketTarget;

    fn open(
        id: &str,
        target: &BasketTarget,
        exec_prices: &PriceMap,
        config: &LedgerConfig,
    ) -> Result<Self, LedgerError> {
        if target.key() != id {
            return Err(LedgerError::LegMismatch {
                id: id.to_string(),
                date: None,
                reason: format!("target legs '{}' do not match the identifier", target.key()),
            });
        }
        let mut entry_prices = Vec::with_capacity(target.legs.len());
        for leg in &target.legs {
            let px = exec_prices
                .get(leg)
                .copied()
                .ok_or_else(|| LedgerError::MissingExecutionPrice {
                    id: id.to_string(),
                    symbol: leg.clone(),
                    date: None,
                })?;
            entry_prices.push(px);
        }
        MultiLegPosition::open(
            &target.legs,
            &entry_prices,
            &target.dollar_sizes,
            config.commission_per_share,
            config.rebalance_tolerance,
        )
    }

    fn is_zero_target(target: &BasketTarget) -> bool {
        target.is_zero()
    }

    /// Entry weights are fixed, so a target that flips the direction of any
    /// leg needs a new basket.
    fn needs_reopen(&self, target: &BasketTarget) -> bool {
        if target.is_zero() {
            return false;
        }
        self.weights().len() != target.dollar_sizes.len()
            || self
                .weights()
                .iter()
                .zip(&target.dollar_sizes)
                .any(|(w, s)| sign(*w) != sign(*s))
    }

    fn update_prices(&mut self, day: &MarketDay) {
        let legs = self.legs();
        let prices: Vec<f64> = legs.iter().map(|l| day.close(l)).collect();
        let dividends: Vec<f64> = legs.iter().map(|l| day.dividend(l)).collect();
        let splits: Vec<f64> = legs.iter().map(|l| day.split(l)).collect();
        self.update_position_prices(&prices, &dividends, &splits);
    }

    fn rebalance(
        &mut self,
        target: &BasketTarget,
        exec_prices: &PriceMap,
    ) -> Result<(), LedgerError> {
        if target.legs.len() != target.dollar_sizes.len()
            || target.legs.iter().map(String::as_str).ne(self.legs())
        {
            return Err(LedgerError::LegMismatch {
                id: self.key().to_string(),
                date: None,
                reason: format!(
                    "rebalance target has legs '{}' and {} sizes",
                    target.key(),
                    target.dollar_sizes.len()
                ),
            });
        }
        let exec = leg_prices(&self.legs(), exec_prices);
        let tolerance = self.tolerance();
        self.update_position_exposure_at(target.gross(), tolerance, &exec);
        Ok(())
    }

    fn is_quoted(&self, exec_prices: &PriceMap) -> bool {
        self.legs().iter().any(|leg| exec_prices.contains_key(*leg))
    }

    fn unwind(&mut self, exec_prices: &PriceMap) {
        let exec = leg_prices(&self.legs(), exec_prices);
        self.close_position_at(&exec);
    }

    fn close(&mut self) {
        self.close_position();
    }

    fn is_open(&self) -> bool {
        MultiLegPosition::is_open(self)
    }

    fn share_count(&self) -> u64 {
        self.shares().iter().map(|s| s.unsigned_abs()).sum()
    }

    fn gross_exposure(&self) -> f64 {
        MultiLegPosition::gross_exposure(self)
    }

    fn take_daily_pl(&mut self) -> DailyPl {
        MultiLegPosition::take_daily_pl(self)
    }

    fn take_daily_turnover(&mut self) -> f64 {
        MultiLegPosition::take_daily_turnover(self)
    }
}
