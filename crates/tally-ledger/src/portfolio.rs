//! Portfolio: the owner of every holding and the driver of the daily cycle.
//!
//! Daily protocol (hard contract, enforced by the backtest loop):
//!
//! ```text
//! update_prices(day) -> settle_day() -> update_position_sizes(targets) -> next day
//! ```
//!
//! Sizing books commissions into the holdings' open accumulators, so they are
//! reported with the next settled day. Holdings removed from the map before
//! their day was settled hand their accumulators to `carry`, which the next
//! settlement drains first; nothing booked is ever lost.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::LedgerError;
use crate::holding::Holding;
use crate::numeric::is_valid_price;
use crate::types::{DailyPl, DailyRecord, LedgerConfig, MarketDay, Settlement, TargetDay};

#[derive(Clone, Debug)]
pub struct Portfolio<H: Holding> {
    config: LedgerConfig,
    positions: BTreeMap<String, H>,
    date: Option<NaiveDate>,
    carry: Settlement,
}

impl<H: Holding> Portfolio<H> {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            positions: BTreeMap::new(),
            date: None,
            carry: Settlement::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Daily cycle
    // -----------------------------------------------------------------------

    /// Mark every holding to the day's closes after corporate actions.
    ///
    /// Priced identifiers that are not tracked yet get a zero-cost
    /// placeholder when `track_unsized` is on and the holding kind supports
    /// one.
    ///
    /// # Errors
    /// [`LedgerError::NonMonotonicDate`] unless `day.date` is after the
    /// previous update.
    pub fn update_prices(&mut self, day: &MarketDay) -> Result<(), LedgerError> {
        if let Some(last) = self.date {
            if day.date <= last {
                return Err(LedgerError::NonMonotonicDate {
                    date: day.date,
                    last,
                });
            }
        }
        self.date = Some(day.date);

        for holding in self.positions.values_mut() {
            holding.update_prices(day);
        }

        if self.config.track_unsized {
            for (symbol, price) in &day.closes {
                if self.positions.contains_key(symbol) || !is_valid_price(*price) {
                    continue;
                }
                if let Some(holding) = H::placeholder(symbol, *price, &self.config) {
                    self.positions.insert(symbol.clone(), holding);
                }
            }
        }
        Ok(())
    }

    /// Move every holding to the day's targets.
    ///
    /// - target present, holding open: rebalance at the execution prices
    /// - target present, holding missing or closed: open a new holding
    /// - no target, listed in the execution prices: unwind to zero (at the
    ///   mark when the listed price is unusable)
    /// - no target, not listed, flat: drop
    /// - no target, not listed, shares outstanding: [`LedgerError::OrphanedShares`]
    ///
    /// # Errors
    /// [`LedgerError::PricesNotUpdated`] before the first price update, plus
    /// the holding's own open/rebalance errors, all tagged with the date.
    pub fn update_position_sizes(
        &mut self,
        targets: &TargetDay<H::Target>,
    ) -> Result<(), LedgerError> {
        let date = self.date.ok_or(LedgerError::PricesNotUpdated {
            operation: "update_position_sizes",
        })?;
        if targets.date != date {
            debug!(%date, target_date = %targets.date, "targets dated differently from last prices");
        }

        for (id, target) in &targets.sizes {
            let resize = self
                .positions
                .get(id)
                .is_some_and(|h| h.is_open() && !h.needs_reopen(target));

            if resize {
                if let Some(holding) = self.positions.get_mut(id) {
                    holding
                        .rebalance(target, &targets.exec_prices)
                        .map_err(|e| e.on(date))?;
                }
                continue;
            }

            if let Some(mut old) = self.positions.remove(id) {
                old.close();
                self.carry.absorb(settle(&mut old));
            }
            if H::is_zero_target(target) {
                continue;
            }
            let holding =
                H::open(id, target, &targets.exec_prices, &self.config).map_err(|e| e.on(date))?;
            debug!(%id, %date, "holding opened");
            self.positions.insert(id.clone(), holding);
        }

        let untargeted: Vec<String> = self
            .positions
            .keys()
            .filter(|id| !targets.sizes.contains_key(*id))
            .cloned()
            .collect();

        for id in untargeted {
            let Some(holding) = self.positions.get_mut(&id) else {
                continue;
            };
            if holding.is_quoted(&targets.exec_prices) {
                holding.unwind(&targets.exec_prices);
                continue;
            }
            let shares = holding.share_count();
            if shares != 0 {
                return Err(LedgerError::OrphanedShares {
                    id,
                    date: Some(date),
                    shares,
                });
            }
            if let Some(mut old) = self.positions.remove(&id) {
                old.close();
                self.carry.absorb(settle(&mut old));
            }
        }
        Ok(())
    }

    /// Liquidate every holding at its mark (end of horizon).
    pub fn close_portfolio_positions(&mut self) {
        for holding in self.positions.values_mut() {
            holding.close();
        }
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    /// Σ|exposure| over every holding (legs included).
    pub fn portfolio_exposure(&self) -> f64 {
        self.positions.values().map(|h| h.gross_exposure()).sum()
    }

    /// Settle the day's P&L, split by the direction of the holding (or leg)
    /// that produced it, then evict closed holdings.
    pub fn portfolio_daily_pl(&mut self) -> DailyPl {
        let mut pl = std::mem::take(&mut self.carry.pl);
        for holding in self.positions.values_mut() {
            pl.accumulate(holding.take_daily_pl());
        }

        let closed: Vec<String> = self
            .positions
            .iter()
            .filter(|(_, h)| !h.is_open())
            .map(|(id, _)| id.clone())
            .collect();
        for id in closed {
            if let Some(mut holding) = self.positions.remove(&id) {
                self.carry.turnover += holding.take_daily_turnover();
                debug!(%id, "closed holding evicted");
            }
        }
        pl
    }

    /// Settle the day's traded dollar volume, including holdings removed
    /// earlier in the day.
    pub fn portfolio_daily_turnover(&mut self) -> f64 {
        let carried = std::mem::take(&mut self.carry.turnover);
        carried
            + self
                .positions
                .values_mut()
                .map(|h| h.take_daily_turnover())
                .sum::<f64>()
    }

    /// Settle the current day into a [`DailyRecord`].
    ///
    /// Turnover is read before P&L because reading P&L evicts closed holdings.
    pub fn settle_day(&mut self) -> Result<DailyRecord, LedgerError> {
        let date = self.date.ok_or(LedgerError::PricesNotUpdated {
            operation: "settle_day",
        })?;
        let turnover = self.portfolio_daily_turnover();
        let exposure = self.portfolio_exposure();
        let pl = self.portfolio_daily_pl();
        Ok(DailyRecord {
            date,
            pl_long: pl.long,
            pl_short: pl.short,
            exposure,
            turnover,
        })
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<&H> {
        self.positions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Tracked identifiers in deterministic order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    /// Date of the last price update.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

fn settle<H: Holding>(holding: &mut H) -> Settlement {
    Settlement {
        pl: holding.take_daily_pl(),
        turnover: holding.take_daily_turnover(),
    }
}
