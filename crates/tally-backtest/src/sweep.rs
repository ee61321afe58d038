//! Parallel parameter sweeps.
//!
//! Every variant owns its own [`BacktestLoop`] (and therefore its own
//! portfolio and target feed clone); the price panel is shared read-only.
//! Results come back in variant order regardless of scheduling.

use rayon::prelude::*;
use tally_ledger::Holding;
use tracing::info;

use crate::engine::{BacktestError, BacktestLoop};
use crate::feed::{PricePanel, TargetFeed};
use crate::types::{BacktestConfig, BacktestReport};

/// One point of a sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepVariant {
    pub label: String,
    pub config: BacktestConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SweepOutcome {
    pub label: String,
    pub result: Result<BacktestReport, BacktestError>,
}

/// Run every variant as an independent simulation on the rayon pool.
///
/// A failing variant does not stop the others; its error is reported in its
/// own outcome.
pub fn run_sweep<H, T>(prices: &PricePanel, targets: &T, variants: &[SweepVariant]) -> Vec<SweepOutcome>
where
    H: Holding,
    T: TargetFeed<H::Target> + Clone + Sync,
{
    info!(variants = variants.len(), days = prices.len(), "sweep started");

    let outcomes: Vec<SweepOutcome> = variants
        .par_iter()
        .map(|variant| {
            let mut feed = targets.clone();
            let mut bt: BacktestLoop<H> = BacktestLoop::new(variant.config.clone());
            SweepOutcome {
                label: variant.label.clone(),
                result: bt.run(prices, &mut feed),
            }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(variants = outcomes.len(), failed, "sweep finished");
    outcomes
}
