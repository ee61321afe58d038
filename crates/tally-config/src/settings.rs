//! Typed views over the merged config JSON.
//!
//! Every reader here must have its pointers listed in the consumption
//! registry, or the unused-key guard will flag them.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use tally_ledger::LedgerConfig;

/// `/ledger/*`: commission, rebalance tolerance, placeholder tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerSettings {
    pub commission_per_share: f64,
    pub rebalance_tolerance: f64,
    pub track_unsized: bool,
}

impl LedgerSettings {
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let defaults = LedgerConfig::default();

        let commission_per_share = non_negative(
            cfg,
            "/ledger/commission_per_share",
            defaults.commission_per_share,
        )?;
        let rebalance_tolerance = non_negative(
            cfg,
            "/ledger/rebalance_tolerance",
            defaults.rebalance_tolerance,
        )?;
        let track_unsized = match cfg.pointer("/ledger/track_unsized") {
            None | Some(Value::Null) => defaults.track_unsized,
            Some(v) => v
                .as_bool()
                .context("/ledger/track_unsized must be a boolean")?,
        };

        Ok(Self {
            commission_per_share,
            rebalance_tolerance,
            track_unsized,
        })
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            commission_per_share: self.commission_per_share,
            rebalance_tolerance: self.rebalance_tolerance,
            track_unsized: self.track_unsized,
        }
    }
}

/// `/run/*`: optional inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSettings {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl RunSettings {
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let start = date(cfg, "/run/start")?;
        let end = date(cfg, "/run/end")?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                bail!("/run/start {s} is after /run/end {e}");
            }
        }
        Ok(Self { start, end })
    }
}

/// `/sweep/*`: the commission grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SweepSettings {
    pub commission_per_share: Vec<f64>,
}

impl SweepSettings {
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let grid = match cfg.pointer("/sweep/commission_per_share") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let x = number(v).ok_or_else(|| {
                        anyhow!("/sweep/commission_per_share/{i} must be a number")
                    })?;
                    if !(x.is_finite() && x >= 0.0) {
                        bail!("/sweep/commission_per_share/{i} must be a finite number >= 0 (got {x})");
                    }
                    Ok(x)
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => bail!("/sweep/commission_per_share must be a list"),
        };
        Ok(Self {
            commission_per_share: grid,
        })
    }
}

/// Accept a number or a numeric string.
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn non_negative(cfg: &Value, ptr: &str, default: f64) -> Result<f64> {
    let x = match cfg.pointer(ptr) {
        None | Some(Value::Null) => return Ok(default),
        Some(v) => number(v).with_context(|| format!("{ptr} must be a number"))?,
    };
    if !(x.is_finite() && x >= 0.0) {
        bail!("{ptr} must be a finite number >= 0 (got {x})");
    }
    Ok(x)
}

fn date(cfg: &Value, ptr: &str) -> Result<Option<NaiveDate>> {
    match cfg.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .with_context(|| format!("{ptr} must be YYYY-MM-DD (got '{s}')")),
        Some(other) => bail!("{ptr} must be a YYYY-MM-DD string (got {other})"),
    }
}
