//! Command handlers for the `tally` binary.
//!
//! Shared argument groups and config plumbing live here; the backtest
//! commands live in [`run`].

pub mod run;

use anyhow::Result;
use clap::Args;
use tally_config::{
    load_layered_yaml, report_unused_keys, CommandKind, LoadedConfig, UnusedKeyPolicy,
};
use tracing::warn;

/// Inputs shared by `run` and `sweep`.
#[derive(Args, Debug, Clone)]
pub struct Inputs {
    /// Layered config paths in merge order
    #[arg(long = "config", required = true)]
    pub config_paths: Vec<String>,

    /// Price panel CSV: date,symbol,close[,dividend][,split]
    #[arg(long)]
    pub prices: String,

    /// Target CSV: date,id,dollar_size[,exec_price] (or date,legs,dollar_sizes with --basket)
    #[arg(long)]
    pub targets: String,

    /// Treat targets as multi-leg baskets
    #[arg(long, default_value_t = false)]
    pub basket: bool,

    /// Fail instead of warning when the config carries keys the command never reads
    #[arg(long, default_value_t = false)]
    pub strict_config: bool,
}

/// Load the layered config and run the unused-key guard for `kind`.
pub fn load_config(inputs: &Inputs, kind: CommandKind) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = inputs.config_paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs)?;

    let policy = if inputs.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(kind, &loaded.config_json, policy)?;
    for ptr in &report.unused_leaf_pointers {
        warn!(command = %report.command, key = %ptr, "config key is not read by this command");
    }

    Ok(loaded)
}
