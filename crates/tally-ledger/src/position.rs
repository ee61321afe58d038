//! Single-instrument position.
//!
//! A `Position` owns the share/price/commission state of one symbol and
//! nothing else. All transitions are deterministic and side-effect free
//! (apart from tracing).
//!
//! Daily accounting: every transition books into the day's accumulators
//! (`daily_pl`, `daily_turnover`). The accumulators are cleared only when
//! the owner settles the day, so commissions charged while sizing after the
//! close are reported together with the next day's price move.

use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::numeric::{commission, is_valid_price, sanitize_dividend, sanitize_split, truncate_shares};
use crate::types::{DailyPl, Direction, Settlement};

/// Fractions below this are representation error, not shares.
const SPLIT_FRACTION_EPSILON: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    symbol: String,
    shares: i64,
    price_entry: f64,
    price_current: f64,
    exposure: f64,
    commission_rate: f64,
    open_position: bool,
    /// Last non-flat direction; decides which side a booking lands on.
    side: Direction,
    pl: DailyPl,
    turnover: f64,
    commission_paid: f64,
    /// Signed value of fractional shares paid out by splits.
    cash_in_lieu: f64,
}

impl Position {
    /// Open a position worth `dollar_size` at `entry_price`.
    ///
    /// `shares = truncate(dollar_size / entry_price)`. A missing (NaN/inf)
    /// or zero entry price opens nothing: zero shares and closed.
    ///
    /// # Errors
    /// [`LedgerError::InvalidPrice`] when a negative price would produce
    /// shares.
    pub fn open(
        symbol: impl Into<String>,
        entry_price: f64,
        dollar_size: f64,
        commission_rate: f64,
    ) -> Result<Self, LedgerError> {
        let symbol = symbol.into();

        if !is_valid_price(entry_price) {
            let raw = if entry_price.is_finite() && entry_price != 0.0 {
                truncate_shares(dollar_size / entry_price)
            } else {
                0
            };
            if raw != 0 {
                return Err(LedgerError::InvalidPrice {
                    id: symbol,
                    date: None,
                    price: entry_price,
                });
            }
            debug!(%symbol, entry_price, "entry price unusable; position not opened");
            return Ok(Self::closed(symbol, entry_price, commission_rate));
        }

        let mut pos = Self::flat(symbol, entry_price, commission_rate);
        let shares = truncate_shares(dollar_size / entry_price);
        pos.trade_to(shares, entry_price);
        debug!(symbol = %pos.symbol, shares, entry_price, "position opened");
        Ok(pos)
    }

    /// Zero-cost, zero-share position used to track a price before sizing.
    /// Opens only on a valid price.
    pub fn placeholder(symbol: impl Into<String>, price: f64, commission_rate: f64) -> Self {
        if is_valid_price(price) {
            Self::flat(symbol.into(), price, commission_rate)
        } else {
            Self::closed(symbol.into(), price, commission_rate)
        }
    }

    fn flat(symbol: String, price: f64, commission_rate: f64) -> Self {
        Self {
            symbol,
            shares: 0,
            price_entry: price,
            price_current: price,
            exposure: 0.0,
            commission_rate,
            open_position: true,
            side: Direction::Flat,
            pl: DailyPl::default(),
            turnover: 0.0,
            commission_paid: 0.0,
            cash_in_lieu: 0.0,
        }
    }

    fn closed(symbol: String, price: f64, commission_rate: f64) -> Self {
        Self {
            open_position: false,
            ..Self::flat(symbol, price, commission_rate)
        }
    }

    // -----------------------------------------------------------------------
    // Daily transitions
    // -----------------------------------------------------------------------

    /// Mark to `new_price` after applying the day's corporate actions.
    ///
    /// Call at most once per simulated day and before any rebalance that day.
    /// A split with multiplier `k` scales shares by `k` and prices by `1/k`
    /// before the new price is applied, so the action itself is value
    /// neutral. A missing `new_price` force-closes the position; the only
    /// P&L booked is the close-out commission.
    pub fn update_price(&mut self, new_price: f64, dividend: f64, split_multiplier: f64) {
        if !self.open_position {
            return;
        }

        match sanitize_split(split_multiplier) {
            Some(k) if k != 1.0 => self.apply_split(k),
            Some(_) => {}
            None => warn!(
                symbol = %self.symbol,
                split_multiplier,
                "unusable split multiplier ignored"
            ),
        }
        if !self.open_position {
            return;
        }

        if !is_valid_price(new_price) {
            warn!(
                symbol = %self.symbol,
                shares = self.shares,
                "price missing; forcing position closed"
            );
            self.close();
            return;
        }

        let dividend = sanitize_dividend(dividend).unwrap_or_else(|| {
            warn!(symbol = %self.symbol, dividend, "unusable dividend treated as zero");
            0.0
        });

        let shares = self.shares as f64;
        let pl = (new_price - self.price_current) * shares + shares * dividend;
        self.pl.book(self.side, pl);
        self.price_current = new_price;
        self.exposure = new_price * shares;
    }

    /// Whole shares survive the split; the fractional remainder is paid out
    /// at the adjusted price as cash in lieu. The payout is at fair value,
    /// so it moves value out of the position without booking P&L:
    /// `shares_new × price_new + cash_in_lieu == shares_old × price_old`.
    /// A split that leaves no whole shares closes the position.
    fn apply_split(&mut self, k: f64) {
        let old = self.shares;
        let exact = old as f64 * k;
        self.shares = truncate_shares(exact);
        self.price_entry /= k;
        self.price_current /= k;
        self.exposure = self.shares as f64 * self.price_current;

        let fraction = exact - self.shares as f64;
        if fraction.abs() > SPLIT_FRACTION_EPSILON {
            let paid = fraction * self.price_current;
            self.cash_in_lieu += paid;
            debug!(symbol = %self.symbol, fraction, paid, "split remainder paid as cash in lieu");
        }
        debug!(symbol = %self.symbol, multiplier = k, old, new = self.shares, "split applied");

        if old != 0 && self.shares == 0 {
            warn!(symbol = %self.symbol, multiplier = k, old, "split left no whole shares; position closed");
            self.exposure = 0.0;
            self.open_position = false;
        }
    }

    /// Resize to `target_dollar_exposure` at the current mark.
    pub fn rebalance(&mut self, target_dollar_exposure: f64) {
        self.rebalance_at(target_dollar_exposure, self.price_current);
    }

    /// Resize to `target_dollar_exposure`, trading at `exec_price`.
    ///
    /// No-op when closed. `new_shares = truncate(target / price)` where price
    /// is `exec_price` when valid and the current mark otherwise. Driving a
    /// non-zero position to zero shares closes it.
    pub fn rebalance_at(&mut self, target_dollar_exposure: f64, exec_price: f64) {
        if !self.open_position {
            return;
        }
        if !target_dollar_exposure.is_finite() {
            warn!(symbol = %self.symbol, target_dollar_exposure, "unusable target ignored");
            return;
        }
        let price = if is_valid_price(exec_price) {
            exec_price
        } else {
            self.price_current
        };
        let had_shares = self.shares != 0;
        let new_shares = truncate_shares(target_dollar_exposure / price);
        self.trade_to(new_shares, price);
        if had_shares && self.shares == 0 {
            self.open_position = false;
        }
    }

    /// Move to `new_shares`, trading the difference at `price`.
    ///
    /// Books commission and the mark difference of the traded shares, adds
    /// turnover, keeps the mark. Returns the absolute number of shares
    /// traded. Never changes `open_position`.
    pub(crate) fn trade_to(&mut self, new_shares: i64, price: f64) -> u64 {
        let delta = new_shares - self.shares;
        if delta == 0 {
            return 0;
        }

        if new_shares != 0 {
            let new_side = Direction::of(new_shares);
            if self.shares == 0 || new_side != self.side {
                self.price_entry = price;
            } else if new_shares.abs() > self.shares.abs() {
                // weighted cost basis when adding to an existing position
                let held = self.shares.abs() as f64;
                let added = (new_shares.abs() - self.shares.abs()) as f64;
                self.price_entry = (self.price_entry * held + price * added) / (held + added);
            }
            self.side = new_side;
        }

        let cost = commission(delta, self.commission_rate);
        let mark_diff = (self.price_current - price) * delta as f64;
        self.pl.book(self.side, mark_diff - cost);
        self.commission_paid += cost;
        self.turnover += delta.unsigned_abs() as f64 * price;

        self.shares = new_shares;
        self.exposure = self.shares as f64 * self.price_current;
        delta.unsigned_abs()
    }

    /// Liquidate at the current mark. No-op when already closed.
    pub fn close(&mut self) {
        if !self.open_position {
            return;
        }
        let price = self.price_current;
        self.trade_to(0, price);
        self.exposure = 0.0;
        self.open_position = false;
        debug!(symbol = %self.symbol, "position closed");
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Take the day's P&L (long/short) and reset it.
    pub fn take_daily_pl(&mut self) -> DailyPl {
        std::mem::take(&mut self.pl)
    }

    /// Take the day's turnover and reset it.
    pub fn take_daily_turnover(&mut self) -> f64 {
        std::mem::take(&mut self.turnover)
    }

    /// Take both daily accumulators.
    pub fn settle_day(&mut self) -> Settlement {
        Settlement {
            pl: self.take_daily_pl(),
            turnover: self.take_daily_turnover(),
        }
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn shares(&self) -> i64 {
        self.shares
    }

    pub fn price_entry(&self) -> f64 {
        self.price_entry
    }

    pub fn price_current(&self) -> f64 {
        self.price_current
    }

    /// Signed dollar exposure (`shares × price_current`).
    pub fn exposure(&self) -> f64 {
        self.exposure
    }

    /// Unsettled P&L for the current accounting day.
    pub fn daily_pl(&self) -> f64 {
        self.pl.total()
    }

    pub fn daily_pl_split(&self) -> DailyPl {
        self.pl
    }

    pub fn daily_turnover(&self) -> f64 {
        self.turnover
    }

    pub fn is_open(&self) -> bool {
        self.open_position
    }

    pub fn direction(&self) -> Direction {
        Direction::of(self.shares)
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    /// Commission charged over the position's whole life.
    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    /// Signed value of fractional shares paid out by splits (negative for
    /// shorts, which pay it).
    pub fn cash_in_lieu(&self) -> f64 {
        self.cash_in_lieu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS * (1.0 + a.abs().max(b.abs()))
    }

    #[test]
    fn open_truncates_and_charges_entry_commission() {
        let p = Position::open("IBM", 100.0, 10_050.0, 0.005).unwrap();
        assert_eq!(p.shares(), 100);
        assert!(approx(p.daily_pl(), -0.5));
        assert!(approx(p.exposure(), 10_000.0));
        assert!(approx(p.daily_turnover(), 10_000.0));
        assert!(p.is_open());
    }

    #[test]
    fn short_open_truncates_toward_zero() {
        let p = Position::open("IBM", 30.0, -1_000.0, 0.0).unwrap();
        assert_eq!(p.shares(), -33);
        assert_eq!(p.direction(), Direction::Short);
    }

    #[test]
    fn zero_or_missing_entry_price_never_opens() {
        for px in [0.0, f64::NAN, f64::INFINITY] {
            let p = Position::open("IBM", px, 10_000.0, 0.005).unwrap();
            assert_eq!(p.shares(), 0);
            assert!(!p.is_open());
            assert_eq!(p.daily_pl(), 0.0);
        }
    }

    #[test]
    fn negative_entry_price_with_shares_is_rejected() {
        let err = Position::open("IBM", -10.0, 1_000.0, 0.005).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPrice { ref id, .. } if id == "IBM"));

        // no shares would result: nothing to reject, nothing opens
        let p = Position::open("IBM", -10.0, 0.0, 0.005).unwrap();
        assert!(!p.is_open());
    }

    #[test]
    fn dividend_is_paid_per_share() {
        let mut p = Position::open("T", 20.0, 2_000.0, 0.0).unwrap();
        p.settle_day();
        p.update_price(20.0, 0.5, 1.0);
        assert!(approx(p.daily_pl(), 50.0));
    }

    #[test]
    fn short_pays_dividend() {
        let mut p = Position::open("T", 20.0, -2_000.0, 0.0).unwrap();
        p.settle_day();
        p.update_price(20.0, 0.5, 1.0);
        assert!(approx(p.daily_pl(), -50.0));
        assert!(approx(p.daily_pl_split().short, -50.0));
    }

    #[test]
    fn split_then_move_books_only_the_move() {
        let mut p = Position::open("AAPL", 700.0, 70_000.0, 0.0).unwrap();
        p.settle_day();
        // 7-for-1 split, then the adjusted price ticks up by 1
        p.update_price(101.0, 0.0, 7.0);
        assert_eq!(p.shares(), 700);
        assert!(approx(p.price_entry(), 100.0));
        assert!(approx(p.daily_pl(), 700.0));
        assert!(approx(p.exposure(), 70_700.0));
    }

    #[test]
    fn unusable_split_multiplier_is_ignored() {
        let mut p = Position::open("AAPL", 100.0, 1_000.0, 0.0).unwrap();
        p.update_price(100.0, 0.0, f64::NAN);
        assert_eq!(p.shares(), 10);
        p.update_price(100.0, 0.0, 0.0);
        assert_eq!(p.shares(), 10);
    }

    #[test]
    fn rebalance_charges_commission_on_delta_only() {
        let mut p = Position::open("IBM", 100.0, 10_000.0, 0.01).unwrap();
        p.settle_day();
        p.rebalance(15_000.0);
        assert_eq!(p.shares(), 150);
        assert!(approx(p.daily_pl(), -0.5));
        assert!(approx(p.daily_turnover(), 5_000.0));
    }

    #[test]
    fn rebalance_can_flip_direction() {
        let mut p = Position::open("IBM", 100.0, 1_000.0, 0.0).unwrap();
        p.rebalance(-500.0);
        assert_eq!(p.shares(), -5);
        assert_eq!(p.direction(), Direction::Short);
        assert!(approx(p.price_entry(), 100.0));
        assert!(p.is_open());
    }

    #[test]
    fn rebalance_at_exec_price_books_mark_difference() {
        let mut p = Position::open("IBM", 100.0, 10_000.0, 0.0).unwrap();
        p.settle_day();
        // buy 10 more at 101 while marked at 100: -10 until the next mark
        p.rebalance_at(11_110.0, 101.0);
        assert_eq!(p.shares(), 110);
        assert!(approx(p.daily_pl(), -10.0));
        assert!(approx(p.exposure(), 11_000.0));
        p.settle_day();
        p.update_price(101.0, 0.0, 1.0);
        assert!(approx(p.daily_pl(), 110.0));
    }

    #[test]
    fn adding_shares_blends_entry_price() {
        let mut p = Position::open("IBM", 100.0, 10_000.0, 0.0).unwrap();
        p.update_price(110.0, 0.0, 1.0);
        p.rebalance(22_000.0);
        assert_eq!(p.shares(), 200);
        assert!(approx(p.price_entry(), 105.0));
    }

    #[test]
    fn rebalance_to_zero_closes() {
        let mut p = Position::open("IBM", 100.0, 1_000.0, 0.005).unwrap();
        p.rebalance(0.0);
        assert_eq!(p.shares(), 0);
        assert!(!p.is_open());
        assert_eq!(p.exposure(), 0.0);
    }

    #[test]
    fn closed_position_ignores_updates() {
        let mut p = Position::open("IBM", 100.0, 1_000.0, 0.005).unwrap();
        p.close();
        p.settle_day();
        p.update_price(120.0, 1.0, 2.0);
        p.rebalance(5_000.0);
        assert_eq!(p.shares(), 0);
        assert_eq!(p.daily_pl(), 0.0);
    }

    #[test]
    fn placeholder_is_free_and_tracks_price() {
        let mut p = Position::placeholder("IBM", 50.0, 0.005);
        assert!(p.is_open());
        assert_eq!(p.shares(), 0);
        p.update_price(55.0, 0.0, 1.0);
        assert_eq!(p.price_current(), 55.0);
        assert_eq!(p.daily_pl(), 0.0);

        // sizing a placeholder opens it at the traded price
        p.rebalance(1_100.0);
        assert_eq!(p.shares(), 20);
        assert!(approx(p.price_entry(), 55.0));

        let missing = Position::placeholder("XYZ", f64::NAN, 0.005);
        assert!(!missing.is_open());
    }

    #[test]
    fn settle_resets_accumulators() {
        let mut p = Position::open("IBM", 100.0, 1_000.0, 0.005).unwrap();
        let s = p.settle_day();
        assert!(approx(s.pl.total(), -0.05));
        assert!(approx(s.turnover, 1_000.0));
        assert_eq!(p.daily_pl(), 0.0);
        assert_eq!(p.daily_turnover(), 0.0);
    }
}
