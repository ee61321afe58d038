use chrono::NaiveDate;
use serde::Serialize;
use tally_ledger::{DailyRecord, LedgerConfig};
use uuid::Uuid;

/// Backtest configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestConfig {
    /// Commission, rebalance tolerance and placeholder tracking.
    pub ledger: LedgerConfig,

    /// First simulated date (inclusive). `None` = start of the panel.
    pub start: Option<NaiveDate>,

    /// Last simulated date (inclusive). Holdings are liquidated on the last
    /// date actually simulated.
    pub end: Option<NaiveDate>,

    /// Deterministic identifier of this run (see [`run_id_for`]).
    pub run_id: Uuid,
}

impl BacktestConfig {
    /// Default ledger parameters over the whole panel.
    pub fn test_defaults() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            start: None,
            end: None,
            run_id: Uuid::nil(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Derive a deterministic run id from the config hash and a variant label.
///
/// No RNG and no wall clock: the same config and label always produce the
/// same id, so sweep outputs can be joined across reruns.
pub fn run_id_for(config_hash: &str, label: &str) -> Uuid {
    let data = format!("tally.run.v1|{config_hash}|{label}");
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, data.as_bytes())
}

/// One committed simulated day, ready for reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub pl_long: f64,
    pub pl_short: f64,
    pub pl: f64,
    /// Gross exposure after the day's price update (before liquidation on
    /// the final day).
    pub exposure: f64,
    pub turnover: f64,
    /// `pl / capital at risk`, where capital at risk is the gross exposure
    /// left by the previous day's sizing; 0 when nothing was at risk.
    pub daily_return: f64,
}

impl DailyRow {
    pub fn from_record(record: &DailyRecord, daily_return: f64) -> Self {
        Self {
            date: record.date,
            pl_long: record.pl_long,
            pl_short: record.pl_short,
            pl: record.pl(),
            exposure: record.exposure,
            turnover: record.turnover,
            daily_return,
        }
    }
}

/// Backtest report produced after a run.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestReport {
    pub run_id: Uuid,
    /// One row per fully processed day, in date order.
    pub rows: Vec<DailyRow>,
    /// Whether the run stopped early at a day boundary.
    pub cancelled: bool,
}

impl BacktestReport {
    pub fn total_pl(&self) -> f64 {
        self.rows.iter().map(|r| r.pl).sum()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }
}
