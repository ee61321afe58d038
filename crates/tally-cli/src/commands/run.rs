//! `tally run` and `tally sweep`.
//!
//! Both load the layered config, the price panel and the target panel, then
//! drive either a single-leg (`Position`) or a basket (`MultiLegPosition`)
//! book through the daily loop. Output is `key=value` lines on stdout; logs
//! go to stderr.

use std::fs::File;

use anyhow::{bail, Context, Result};
use tally_backtest::loader::{load_basket_targets, load_price_panel, load_targets};
use tally_backtest::{
    run_id_for, run_sweep, summary, BacktestConfig, BacktestLoop, BacktestReport, CancelToken,
    CsvRowSink, PricePanel, SweepOutcome, SweepVariant, TargetFeed,
};
use tally_config::{CommandKind, LedgerSettings, LoadedConfig, RunSettings, SweepSettings};
use tally_ledger::{Holding, LedgerConfig, MultiLegPosition, Position};
use tracing::info;

use super::{load_config, Inputs};

/// Config, typed backtest parameters and the price panel for one command.
struct Prepared {
    loaded: LoadedConfig,
    config: BacktestConfig,
    panel: PricePanel,
}

fn prepare(inputs: &Inputs, kind: CommandKind) -> Result<Prepared> {
    let loaded = load_config(inputs, kind)?;
    let ledger = LedgerSettings::from_config_json(&loaded.config_json)?;
    let window = RunSettings::from_config_json(&loaded.config_json)?;

    let panel = load_price_panel(&inputs.prices)
        .with_context(|| format!("load price panel failed: {}", inputs.prices))?;
    info!(
        days = panel.len(),
        symbols = panel.symbols().len(),
        config_hash = %loaded.config_hash,
        "inputs loaded"
    );

    let config = BacktestConfig {
        ledger: ledger.ledger_config(),
        start: window.start,
        end: window.end,
        run_id: run_id_for(&loaded.config_hash, kind.as_str()),
    };
    Ok(Prepared {
        loaded,
        config,
        panel,
    })
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Execute `tally run`.
pub fn run(inputs: &Inputs, out: Option<&str>) -> Result<()> {
    let Prepared {
        loaded,
        config,
        panel,
    } = prepare(inputs, CommandKind::Run)?;

    let report = if inputs.basket {
        let mut targets = load_basket_targets(&inputs.targets)
            .with_context(|| format!("load basket targets failed: {}", inputs.targets))?;
        simulate::<MultiLegPosition, _>(config, &panel, &mut targets, out)?
    } else {
        let mut targets = load_targets(&inputs.targets)
            .with_context(|| format!("load targets failed: {}", inputs.targets))?;
        simulate::<Position, _>(config, &panel, &mut targets, out)?
    };

    let s = summary(&report);
    println!("run_id={}", report.run_id);
    println!("config_hash={}", loaded.config_hash);
    println!("days={}", s.days);
    println!("cancelled={}", report.cancelled);
    println!("total_pl={:.2}", s.total_pl);
    println!("total_pl_long={:.2}", s.total_pl_long);
    println!("total_pl_short={:.2}", s.total_pl_short);
    println!("mean_daily_return={:.8}", s.mean_daily_return);
    println!("sharpe={:.4}", s.sharpe);
    println!("max_drawdown={:.2}", s.max_drawdown);
    println!("max_exposure={:.2}", s.max_exposure);
    println!("total_turnover={:.2}", s.total_turnover);
    println!("mean_turnover={:.2}", s.mean_turnover);
    if let Some(path) = out {
        println!("rows_path={path}");
    }
    Ok(())
}

/// Drive one book through the loop. With `out`, every committed day is
/// appended to the CSV before the next day starts.
fn simulate<H, T>(
    config: BacktestConfig,
    panel: &PricePanel,
    targets: &mut T,
    out: Option<&str>,
) -> Result<BacktestReport>
where
    H: Holding,
    T: TargetFeed<H::Target>,
{
    let mut bt: BacktestLoop<H> = BacktestLoop::new(config);
    let Some(path) = out else {
        return Ok(bt.run(panel, targets)?);
    };

    let file = File::create(path).with_context(|| format!("create output failed: {path}"))?;
    let mut sink = CsvRowSink::new(file);
    let report = bt.run_with(panel, targets, &CancelToken::default(), &mut sink)?;
    info!(rows = sink.rows_written(), path, "daily rows written");
    sink.into_inner()?;
    Ok(report)
}

// ---------------------------------------------------------------------------
// sweep
// ---------------------------------------------------------------------------

/// Execute `tally sweep`: one variant per `/sweep/commission_per_share`
/// entry (or the configured commission alone when the grid is empty).
pub fn sweep(inputs: &Inputs) -> Result<()> {
    let Prepared {
        loaded,
        config,
        panel,
    } = prepare(inputs, CommandKind::Sweep)?;

    let grid = SweepSettings::from_config_json(&loaded.config_json)?.commission_per_share;
    let rates = if grid.is_empty() {
        vec![config.ledger.commission_per_share]
    } else {
        grid
    };
    let variants = commission_variants(&config, &loaded.config_hash, &rates);

    let outcomes = if inputs.basket {
        let targets = load_basket_targets(&inputs.targets)
            .with_context(|| format!("load basket targets failed: {}", inputs.targets))?;
        run_sweep::<MultiLegPosition, _>(&panel, &targets, &variants)
    } else {
        let targets = load_targets(&inputs.targets)
            .with_context(|| format!("load targets failed: {}", inputs.targets))?;
        run_sweep::<Position, _>(&panel, &targets, &variants)
    };

    println!("config_hash={}", loaded.config_hash);
    let mut failed = 0usize;
    for (i, (outcome, rate)) in outcomes.iter().zip(&rates).enumerate() {
        if !print_outcome(i, *rate, outcome) {
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} sweep variants failed", outcomes.len());
    }
    Ok(())
}

fn commission_variants(base: &BacktestConfig, config_hash: &str, rates: &[f64]) -> Vec<SweepVariant> {
    rates
        .iter()
        .enumerate()
        .map(|(i, &rate)| {
            let label = format!("commission_per_share={rate}");
            SweepVariant {
                config: BacktestConfig {
                    ledger: LedgerConfig {
                        commission_per_share: rate,
                        ..base.ledger
                    },
                    run_id: run_id_for(config_hash, &format!("SWEEP|{i}|{label}")),
                    ..base.clone()
                },
                label,
            }
        })
        .collect()
}

/// Print one summary line; false when the variant failed.
fn print_outcome(index: usize, rate: f64, outcome: &SweepOutcome) -> bool {
    match &outcome.result {
        Ok(report) => {
            let s = summary(report);
            println!(
                "variant={index} commission_per_share={rate} run_id={} days={} total_pl={:.2} sharpe={:.4} max_drawdown={:.2} total_turnover={:.2}",
                report.run_id, s.days, s.total_pl, s.sharpe, s.max_drawdown, s.total_turnover
            );
            true
        }
        Err(e) => {
            println!("variant={index} commission_per_share={rate} error=\"{e}\"");
            false
        }
    }
}
