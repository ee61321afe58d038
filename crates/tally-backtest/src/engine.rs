use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tally_ledger::{safe_ratio, Holding, LedgerError, Portfolio};
use tracing::{debug, info, warn};

use crate::feed::{PriceFeed, TargetFeed};
use crate::types::{BacktestConfig, BacktestReport, DailyRow};

/// Backtest errors.
#[derive(Debug, Clone, PartialEq)]
pub enum BacktestError {
    /// Ledger contract violation (forwarded).
    Ledger(LedgerError),
    /// No market day falls inside the configured window.
    EmptyCalendar,
    /// A feed could not produce data for a date.
    Feed { date: NaiveDate, reason: String },
    /// An observer failed to persist a committed day.
    Output(String),
}

impl From<LedgerError> for BacktestError {
    fn from(e: LedgerError) -> Self {
        BacktestError::Ledger(e)
    }
}

impl std::fmt::Display for BacktestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BacktestError::Ledger(e) => write!(f, "{e}"),
            BacktestError::EmptyCalendar => write!(f, "no market days inside the backtest window"),
            BacktestError::Feed { date, reason } => write!(f, "feed error on {date}: {reason}"),
            BacktestError::Output(e) => write!(f, "output error: {e}"),
        }
    }
}

impl std::error::Error for BacktestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BacktestError::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

/// Cooperative cancellation checked at every day boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives every day once its price/settle/size cycle has committed.
pub trait DayObserver {
    fn on_day(&mut self, row: &DailyRow) -> Result<(), BacktestError>;
}

/// Observer that ignores every day.
pub struct NoopObserver;

impl DayObserver for NoopObserver {
    fn on_day(&mut self, _row: &DailyRow) -> Result<(), BacktestError> {
        Ok(())
    }
}

/// The daily backtest loop over one portfolio.
///
/// Per day: `update_prices -> settle_day -> targets -> update_position_sizes`.
/// On the last day of the window every holding is liquidated before settling
/// instead of being sized.
pub struct BacktestLoop<H: Holding> {
    config: BacktestConfig,
    portfolio: Portfolio<H>,
}

impl<H: Holding> BacktestLoop<H> {
    pub fn new(config: BacktestConfig) -> Self {
        let portfolio = Portfolio::new(config.ledger);
        Self { config, portfolio }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Portfolio state after the last processed day.
    pub fn portfolio(&self) -> &Portfolio<H> {
        &self.portfolio
    }

    /// Run the whole window without cancellation or observer.
    pub fn run<P, T>(&mut self, prices: &P, targets: &mut T) -> Result<BacktestReport, BacktestError>
    where
        P: PriceFeed + ?Sized,
        T: TargetFeed<H::Target> + ?Sized,
    {
        self.run_with(prices, targets, &CancelToken::default(), &mut NoopObserver)
    }

    /// Run the window, stopping at the first day boundary after `cancel`
    /// fires. Rows of every fully processed day are kept and reported.
    ///
    /// A loop simulates one window; running it again fails on the first
    /// date that is not after the last processed one.
    pub fn run_with<P, T, O>(
        &mut self,
        prices: &P,
        targets: &mut T,
        cancel: &CancelToken,
        observer: &mut O,
    ) -> Result<BacktestReport, BacktestError>
    where
        P: PriceFeed + ?Sized,
        T: TargetFeed<H::Target> + ?Sized,
        O: DayObserver + ?Sized,
    {
        let days: Vec<_> = prices
            .days()
            .iter()
            .filter(|d| self.config.contains(d.date))
            .collect();
        let (Some(first), Some(last)) = (days.first(), days.last()) else {
            return Err(BacktestError::EmptyCalendar);
        };

        let run_id = self.config.run_id;
        info!(%run_id, start = %first.date, end = %last.date, days = days.len(), "backtest started");

        let mut rows = Vec::with_capacity(days.len());
        let mut cancelled = false;
        // gross exposure left by the previous day's sizing
        let mut at_risk = 0.0;

        for (i, day) in days.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(%run_id, date = %day.date, "backtest cancelled at day boundary");
                cancelled = true;
                break;
            }
            let final_day = i + 1 == days.len();

            self.portfolio.update_prices(day)?;

            let record = if final_day {
                let exposure = self.portfolio.portfolio_exposure();
                self.portfolio.close_portfolio_positions();
                let mut record = self.portfolio.settle_day()?;
                record.exposure = exposure;
                record
            } else {
                self.portfolio.settle_day()?
            };

            let row = DailyRow::from_record(&record, safe_ratio(record.pl(), at_risk));

            if !final_day {
                if let Some(t) = targets.targets(day)? {
                    self.portfolio.update_position_sizes(&t)?;
                }
            }
            at_risk = self.portfolio.portfolio_exposure();

            debug!(
                date = %row.date,
                pl = row.pl,
                exposure = row.exposure,
                turnover = row.turnover,
                holdings = self.portfolio.len(),
                "day committed"
            );
            observer.on_day(&row)?;
            rows.push(row);
        }

        let report = BacktestReport {
            run_id,
            rows,
            cancelled,
        };
        info!(
            %run_id,
            days = report.rows.len(),
            total_pl = report.total_pl(),
            cancelled,
            "backtest finished"
        );
        Ok(report)
    }
}
