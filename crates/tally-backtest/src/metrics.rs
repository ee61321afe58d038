use crate::types::{BacktestReport, DailyRow};

/// Trading days per year used to annualise the Sharpe ratio.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Run-level statistics over the daily rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub days: usize,
    pub total_pl: f64,
    pub total_pl_long: f64,
    pub total_pl_short: f64,
    pub mean_daily_return: f64,
    /// Annualised mean/stdev of daily returns; 0 when undefined.
    pub sharpe: f64,
    /// Largest peak-to-trough fall of cumulative P&L (dollars, >= 0).
    pub max_drawdown: f64,
    pub max_exposure: f64,
    pub total_turnover: f64,
    pub mean_turnover: f64,
}

/// Summarise a report's rows.
pub fn summary(report: &BacktestReport) -> Summary {
    summarize_rows(&report.rows)
}

pub fn summarize_rows(rows: &[DailyRow]) -> Summary {
    let n = rows.len();
    let total_pl_long: f64 = rows.iter().map(|r| r.pl_long).sum();
    let total_pl_short: f64 = rows.iter().map(|r| r.pl_short).sum();
    let total_turnover: f64 = rows.iter().map(|r| r.turnover).sum();
    let max_exposure = rows.iter().map(|r| r.exposure).fold(0.0, f64::max);

    let (mean, stdev) = mean_stdev(rows.iter().map(|r| r.daily_return));
    let sharpe = if stdev > 0.0 {
        mean / stdev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let mut cumulative = 0.0;
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;
    for r in rows {
        cumulative += r.pl;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.max(peak - cumulative);
    }

    Summary {
        days: n,
        total_pl: total_pl_long + total_pl_short,
        total_pl_long,
        total_pl_short,
        mean_daily_return: mean,
        sharpe,
        max_drawdown,
        max_exposure,
        total_turnover,
        mean_turnover: if n == 0 { 0.0 } else { total_turnover / n as f64 },
    }
}

/// Population mean and sample standard deviation (0 below two samples).
fn mean_stdev(xs: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = xs.clone().count();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = xs.clone().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var = xs.map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}
