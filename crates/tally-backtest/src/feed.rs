//! Input feeds.
//!
//! Prices are pushed into the ledger one [`MarketDay`] at a time; targets
//! come from the strategy layer through [`TargetFeed`]. The panel is shared
//! read-only between parallel runs, so feeds never mutate it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tally_ledger::{MarketDay, TargetDay};

use crate::engine::BacktestError;

/// Ordered calendar of market days.
pub trait PriceFeed {
    /// Days in strictly increasing date order.
    fn days(&self) -> &[MarketDay];
}

/// Source of the targets sized after each day's close.
pub trait TargetFeed<T> {
    /// Targets for `day`, or `None` to leave every holding as it is.
    ///
    /// Called once per simulated day, after the day has been settled.
    fn targets(&mut self, day: &MarketDay) -> Result<Option<TargetDay<T>>, BacktestError>;
}

/// In-memory price panel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PricePanel {
    days: Vec<MarketDay>,
}

impl PricePanel {
    /// Build a panel; days are sorted by date.
    ///
    /// # Errors
    /// [`BacktestError::Feed`] when two days share a date.
    pub fn new(mut days: Vec<MarketDay>) -> Result<Self, BacktestError> {
        days.sort_by_key(|d| d.date);
        if let Some(w) = days.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(BacktestError::Feed {
                date: w[1].date,
                reason: "duplicate market day".to_string(),
            });
        }
        Ok(Self { days })
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Every symbol quoted on at least one day, sorted.
    pub fn symbols(&self) -> BTreeSet<&str> {
        self.days
            .iter()
            .flat_map(|d| d.closes.keys().map(String::as_str))
            .collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.last().map(|d| d.date)
    }
}

impl PriceFeed for PricePanel {
    fn days(&self) -> &[MarketDay] {
        &self.days
    }
}

impl PriceFeed for [MarketDay] {
    fn days(&self) -> &[MarketDay] {
        self
    }
}

/// Preloaded targets keyed by date.
///
/// Execution prices default to the day's closes; prices given explicitly on
/// a target row override them. Dates without rows produce no sizing.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticTargets<T> {
    by_date: BTreeMap<NaiveDate, TargetDay<T>>,
}

impl<T> StaticTargets<T> {
    /// Later entries for the same date are merged into earlier ones.
    pub fn new(days: impl IntoIterator<Item = TargetDay<T>>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, TargetDay<T>> = BTreeMap::new();
        for day in days {
            match by_date.get_mut(&day.date) {
                Some(existing) => {
                    existing.sizes.extend(day.sizes);
                    existing.exec_prices.extend(day.exec_prices);
                }
                None => {
                    by_date.insert(day.date, day);
                }
            }
        }
        Self { by_date }
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }
}

impl<T: Clone> TargetFeed<T> for StaticTargets<T> {
    fn targets(&mut self, day: &MarketDay) -> Result<Option<TargetDay<T>>, BacktestError> {
        Ok(self.by_date.get(&day.date).map(|t| {
            let mut exec_prices = day.closes.clone();
            exec_prices.extend(t.exec_prices.iter().map(|(s, p)| (s.clone(), *p)));
            TargetDay {
                date: day.date,
                sizes: t.sizes.clone(),
                exec_prices,
            }
        }))
    }
}

/// Adapter turning a closure into a [`TargetFeed`].
pub struct TargetFn<F>(pub F);

impl<T, F> TargetFeed<T> for TargetFn<F>
where
    F: FnMut(&MarketDay) -> Result<Option<TargetDay<T>>, BacktestError>,
{
    fn targets(&mut self, day: &MarketDay) -> Result<Option<TargetDay<T>>, BacktestError> {
        (self.0)(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    #[test]
    fn panel_sorts_and_rejects_duplicate_dates() {
        let panel = PricePanel::new(vec![
            MarketDay::new(d(3)).with_close("IBM", 1.0),
            MarketDay::new(d(1)).with_close("AAPL", 1.0),
        ])
        .unwrap();
        assert_eq!(panel.first_date(), Some(d(1)));
        assert_eq!(panel.symbols().into_iter().collect::<Vec<_>>(), vec!["AAPL", "IBM"]);

        let err = PricePanel::new(vec![MarketDay::new(d(1)), MarketDay::new(d(1))]).unwrap_err();
        assert!(matches!(err, BacktestError::Feed { date, .. } if date == d(1)));
    }

    #[test]
    fn static_targets_overlay_explicit_exec_prices_on_closes() {
        let mut feed = StaticTargets::new(vec![TargetDay::new(d(2))
            .with_target("IBM", 1_000.0)
            .with_exec_price("IBM", 99.5)]);
        let day = MarketDay::new(d(2))
            .with_close("IBM", 100.0)
            .with_close("AAPL", 200.0);

        let t = feed.targets(&day).unwrap().unwrap();
        assert_eq!(t.exec_prices.get("IBM"), Some(&99.5));
        assert_eq!(t.exec_prices.get("AAPL"), Some(&200.0));
        assert_eq!(t.sizes.get("IBM"), Some(&1_000.0));

        assert!(feed.targets(&MarketDay::new(d(3))).unwrap().is_none());
    }
}
