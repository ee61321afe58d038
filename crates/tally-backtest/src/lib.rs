//! tally-backtest
//!
//! Daily backtest driver around the tally ledger.
//!
//! Pipeline per day: PRICES -> LEDGER SETTLE -> TARGETS -> LEDGER SIZING
//!
//! - Deterministic replay (same panel + targets + config => identical rows)
//! - Forced liquidation on the last simulated date
//! - Returns on the exposure left by the previous day's sizing
//! - Cancellation at day boundaries with per-day checkpoint observer
//! - CSV panel loaders and parallel parameter sweeps

mod engine;
pub mod feed;
pub mod loader;
pub mod metrics;
pub mod report;
pub mod sweep;
pub mod types;

pub use engine::{BacktestError, BacktestLoop, CancelToken, DayObserver, NoopObserver};
pub use feed::{PriceFeed, PricePanel, StaticTargets, TargetFeed, TargetFn};
pub use loader::LoadError;
pub use metrics::{summary, Summary};
pub use report::{write_records_csv, CsvRowSink};
pub use sweep::{run_sweep, SweepOutcome, SweepVariant};
pub use types::{run_id_for, BacktestConfig, BacktestReport, DailyRow};
