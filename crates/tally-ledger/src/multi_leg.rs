//! Multi-leg (basket / pair) position.
//!
//! A basket is a fixed, ordered set of legs that is opened, rebalanced and
//! closed as one unit. Each leg is a [`Position`]; the basket adds the
//! state machine and the proportional rebalance rule on top.
//!
//! ```text
//! Open --(any leg price missing)--> PendingClose --(next price update)--> Closed
//!   \----------------------(close_position / zero target)------------------/
//! ```
//!
//! Directional weights are fixed at entry (`w_i = size_i / Σ|size_j|`).
//! A rebalance sizes every leg to `truncate(target × w_i / price_i)`, a pure
//! function of the target and prices, which makes a repeated rebalance to
//! the same target a no-op.

use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::numeric::{is_valid_price, safe_ratio, truncate_shares};
use crate::position::Position;
use crate::types::{DailyPl, Settlement};

/// Lifecycle of a basket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BasketState {
    Open,
    /// A leg lost its price; the next price update unwinds the rest.
    PendingClose,
    Closed,
}

/// Target for a basket: the legs and their signed dollar sizes.
#[derive(Clone, Debug, PartialEq)]
pub struct BasketTarget {
    pub legs: Vec<String>,
    pub dollar_sizes: Vec<f64>,
}

impl BasketTarget {
    pub fn new<I, S>(legs: I, dollar_sizes: Vec<f64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            legs: legs.into_iter().map(Into::into).collect(),
            dollar_sizes,
        }
    }

    /// Canonical identifier of the leg set (`"IBM|AAPL"`).
    pub fn key(&self) -> String {
        self.legs.join("|")
    }

    /// Σ|dollar_size_i|: the gross exposure this target asks for.
    pub fn gross(&self) -> f64 {
        self.dollar_sizes.iter().map(|s| s.abs()).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.dollar_sizes.iter().all(|s| *s == 0.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MultiLegPosition {
    key: String,
    legs: Vec<Position>,
    weights: Vec<f64>,
    state: BasketState,
    to_close_position: bool,
    tolerance: f64,
    entry_gross: f64,
    settled_pl: f64,
    stat_holding_days: u32,
    stat_rebalance_count: u32,
}

impl MultiLegPosition {
    /// Open every leg at its entry price with its own dollar size.
    ///
    /// If any entry price is unusable the basket never opens: all legs stay
    /// flat and the state is `Closed`.
    ///
    /// # Errors
    /// [`LedgerError::LegMismatch`] when the three vectors disagree in length
    /// or are empty; [`LedgerError::InvalidPrice`] from a leg.
    pub fn open<S: AsRef<str>>(
        legs: &[S],
        entry_prices: &[f64],
        dollar_sizes: &[f64],
        commission_rate: f64,
        tolerance: f64,
    ) -> Result<Self, LedgerError> {
        let key = legs.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("|");

        if legs.is_empty() || legs.len() != entry_prices.len() || legs.len() != dollar_sizes.len()
        {
            return Err(LedgerError::LegMismatch {
                id: key,
                date: None,
                reason: format!(
                    "{} legs, {} prices, {} sizes",
                    legs.len(),
                    entry_prices.len(),
                    dollar_sizes.len()
                ),
            });
        }

        let gross_target: f64 = dollar_sizes.iter().map(|s| s.abs()).sum();
        let weights = dollar_sizes
            .iter()
            .map(|s| safe_ratio(*s, gross_target))
            .collect();

        let priced = entry_prices.iter().all(|p| is_valid_price(*p));
        let positions = if priced {
            legs.iter()
                .zip(entry_prices)
                .zip(dollar_sizes)
                .map(|((sym, px), size)| Position::open(sym.as_ref(), *px, *size, commission_rate))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            debug!(basket = %key, "entry price missing on a leg; basket not opened");
            legs.iter()
                .zip(entry_prices)
                .map(|(sym, px)| {
                    let mut leg = Position::placeholder(sym.as_ref(), *px, commission_rate);
                    leg.close();
                    leg
                })
                .collect()
        };

        let mut basket = Self {
            key,
            legs: positions,
            weights,
            state: if priced {
                BasketState::Open
            } else {
                BasketState::Closed
            },
            to_close_position: false,
            tolerance,
            entry_gross: 0.0,
            settled_pl: 0.0,
            stat_holding_days: 0,
            stat_rebalance_count: 0,
        };
        basket.entry_gross = basket.gross_exposure();
        if priced {
            debug!(
                basket = %basket.key,
                shares = ?basket.shares(),
                gross = basket.entry_gross,
                "basket opened"
            );
        }
        Ok(basket)
    }

    // -----------------------------------------------------------------------
    // Daily transitions
    // -----------------------------------------------------------------------

    /// Apply one day of prices and corporate actions, leg by leg.
    ///
    /// `dividends` and `splits` may be empty (defaults 0 and 1); otherwise
    /// they are indexed like `prices`. A missing price, or a split that
    /// leaves a leg without whole shares, zeroes that leg and moves the
    /// basket to `PendingClose` without touching the other legs; the
    /// following call completes the unwind.
    pub fn update_position_prices(&mut self, prices: &[f64], dividends: &[f64], splits: &[f64]) {
        let state = self.state;
        if state == BasketState::Closed {
            return;
        }

        for (i, leg) in self.legs.iter_mut().enumerate() {
            let price = prices.get(i).copied().unwrap_or(f64::NAN);
            let dividend = dividends.get(i).copied().unwrap_or(0.0);
            let split = splits.get(i).copied().unwrap_or(1.0);
            leg.update_price(price, dividend, split);
        }

        match state {
            BasketState::Open => {
                if self.legs.iter().any(|l| !l.is_open()) {
                    warn!(basket = %self.key, "leg closed; basket pending close");
                    self.to_close_position = true;
                    self.state = BasketState::PendingClose;
                } else {
                    self.stat_holding_days += 1;
                }
            }
            BasketState::PendingClose => self.close_position(),
            BasketState::Closed => {}
        }
    }

    /// Rescale to `target_gross` at the current marks.
    pub fn update_position_exposure(&mut self, target_gross: f64, tolerance: f64) -> bool {
        self.update_position_exposure_at(target_gross, tolerance, &[])
    }

    /// Rescale every leg so gross exposure matches `target_gross` while
    /// keeping the entry weights, trading at `exec_prices` (indexed like the
    /// legs; missing entries fall back to the leg's mark).
    ///
    /// Nothing happens unless `|gross − target| > tolerance × target`. A
    /// zero target closes the basket. Returns whether any share traded.
    pub fn update_position_exposure_at(
        &mut self,
        target_gross: f64,
        tolerance: f64,
        exec_prices: &[f64],
    ) -> bool {
        if self.state != BasketState::Open {
            return false;
        }
        if !target_gross.is_finite() {
            warn!(basket = %self.key, target_gross, "unusable target exposure ignored");
            return false;
        }
        if target_gross <= 0.0 {
            self.close_position_at(exec_prices);
            return true;
        }

        let gross = self.gross_exposure();
        if (gross - target_gross).abs() <= tolerance * target_gross {
            return false;
        }

        let mut traded = 0u64;
        for (i, leg) in self.legs.iter_mut().enumerate() {
            let price = exec_prices
                .get(i)
                .copied()
                .filter(|p| is_valid_price(*p))
                .unwrap_or_else(|| leg.price_current());
            let new_shares = truncate_shares(target_gross * self.weights[i] / price);
            traded += leg.trade_to(new_shares, price);
        }

        if traded > 0 {
            self.stat_rebalance_count += 1;
            debug!(
                basket = %self.key,
                target_gross,
                shares = ?self.shares(),
                traded,
                "basket rebalanced"
            );
        }
        traded > 0
    }

    /// Close every leg at its mark. Idempotent.
    pub fn close_position(&mut self) {
        self.close_position_at(&[]);
    }

    /// Close every leg, trading at `exec_prices` where given.
    pub fn close_position_at(&mut self, exec_prices: &[f64]) {
        if self.state == BasketState::Closed {
            return;
        }
        for (i, leg) in self.legs.iter_mut().enumerate() {
            if let Some(px) = exec_prices.get(i).copied().filter(|p| is_valid_price(*p)) {
                leg.rebalance_at(0.0, px);
            }
            leg.close();
        }
        self.state = BasketState::Closed;
        debug!(basket = %self.key, "basket closed");
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    pub fn take_daily_pl(&mut self) -> DailyPl {
        let mut pl = DailyPl::default();
        for leg in &mut self.legs {
            pl.accumulate(leg.take_daily_pl());
        }
        self.settled_pl += pl.total();
        pl
    }

    pub fn take_daily_turnover(&mut self) -> f64 {
        self.legs.iter_mut().map(|l| l.take_daily_turnover()).sum()
    }

    pub fn settle_day(&mut self) -> Settlement {
        Settlement {
            pl: self.take_daily_pl(),
            turnover: self.take_daily_turnover(),
        }
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// Leg-set identifier (`"IBM|AAPL"`).
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn legs(&self) -> Vec<&str> {
        self.legs.iter().map(|l| l.symbol()).collect()
    }

    pub fn leg_positions(&self) -> &[Position] {
        &self.legs
    }

    pub fn shares(&self) -> Vec<i64> {
        self.legs.iter().map(|l| l.shares()).collect()
    }

    pub fn prices_entry(&self) -> Vec<f64> {
        self.legs.iter().map(|l| l.price_entry()).collect()
    }

    pub fn prices_current(&self) -> Vec<f64> {
        self.legs.iter().map(|l| l.price_current()).collect()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Σ|shares_i × price_i|.
    pub fn gross_exposure(&self) -> f64 {
        self.legs.iter().map(|l| l.exposure().abs()).sum()
    }

    /// Σ shares_i × price_i.
    pub fn net_exposure(&self) -> f64 {
        self.legs.iter().map(|l| l.exposure()).sum()
    }

    pub fn daily_pl(&self) -> f64 {
        self.legs.iter().map(|l| l.daily_pl()).sum()
    }

    pub fn daily_turnover(&self) -> f64 {
        self.legs.iter().map(|l| l.daily_turnover()).sum()
    }

    pub fn state(&self) -> BasketState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != BasketState::Closed
    }

    pub fn to_close_position(&self) -> bool {
        self.to_close_position
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn stat_holding_days(&self) -> u32 {
        self.stat_holding_days
    }

    pub fn stat_rebalance_count(&self) -> u32 {
        self.stat_rebalance_count
    }

    /// Cumulative P&L since entry (settled and unsettled) over the entry
    /// gross exposure.
    pub fn stat_perc_gain(&self) -> f64 {
        safe_ratio(self.settled_pl + self.daily_pl(), self.entry_gross)
    }

    pub fn commission_paid(&self) -> f64 {
        self.legs.iter().map(|l| l.commission_paid()).sum()
    }

    /// Cash in lieu paid out by splits across all legs.
    pub fn cash_in_lieu(&self) -> f64 {
        self.legs.iter().map(|l| l.cash_in_lieu()).sum()
    }
}
