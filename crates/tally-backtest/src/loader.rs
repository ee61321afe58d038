//! CSV panel loaders (deterministic).
//!
//! Price panel, one row per (date, symbol):
//!
//! ```text
//! date,symbol,close[,dividend][,split]
//! 2024-01-02,IBM,100.0,,
//! 2024-01-03,IBM,,,          <- empty close = missing price
//! ```
//!
//! Single-leg targets, one row per (date, id):
//!
//! ```text
//! date,id,dollar_size[,exec_price]
//! ```
//!
//! Basket targets, legs and sizes `|`-separated in matching order:
//!
//! ```text
//! date,legs,dollar_sizes
//! 2024-01-02,IBM|AAPL,1000|-1000
//! ```
//!
//! Lines starting with `#` are comments. Output is ordered by date, then
//! identifier, regardless of row order.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tally_ledger::{BasketTarget, MarketDay, TargetDay};

use crate::feed::{PricePanel, StaticTargets};

/// Loader errors are small, explicit, and test-friendly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    EmptyInput,
    Csv { line: Option<u64>, reason: String },
    BadRow { line: u64, reason: String },
    Duplicate { date: NaiveDate, id: String },
    Io(String),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e.to_string())
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Csv {
            line: e.position().map(|p| p.line()),
            reason: e.to_string(),
        }
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::EmptyInput => write!(f, "empty input"),
            LoadError::Csv {
                line: Some(line),
                reason,
            } => write!(f, "csv error at line {line}: {reason}"),
            LoadError::Csv { line: None, reason } => write!(f, "csv error: {reason}"),
            LoadError::BadRow { line, reason } => write!(f, "bad row at line {line}: {reason}"),
            LoadError::Duplicate { date, id } => write!(f, "duplicate row for '{id}' on {date}"),
            LoadError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    symbol: String,
    close: Option<f64>,
    #[serde(default)]
    dividend: Option<f64>,
    #[serde(default)]
    split: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TargetRow {
    date: NaiveDate,
    id: String,
    dollar_size: f64,
    #[serde(default)]
    exec_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BasketRow {
    date: NaiveDate,
    legs: String,
    dollar_sizes: String,
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(input)
}

/// Deserialize every row, keeping the 1-based line of each.
fn rows<R: Read, T: for<'de> Deserialize<'de>>(input: R) -> Result<Vec<(u64, T)>, LoadError> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(LoadError::EmptyInput);
    }
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let line = rec.position().map_or(0, |p| p.line());
        let row: T = rec
            .deserialize(Some(&headers))
            .map_err(|e| LoadError::Csv {
                line: Some(line),
                reason: e.to_string(),
            })?;
        out.push((line, row));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

pub fn load_price_panel(path: impl AsRef<Path>) -> Result<PricePanel, LoadError> {
    parse_price_panel(File::open(path)?)
}

pub fn parse_price_panel<R: Read>(input: R) -> Result<PricePanel, LoadError> {
    let mut days: BTreeMap<NaiveDate, MarketDay> = BTreeMap::new();

    for (line, row) in rows::<_, PriceRow>(input)? {
        if row.symbol.is_empty() {
            return Err(LoadError::BadRow {
                line,
                reason: "symbol is empty".to_string(),
            });
        }
        let day = days
            .entry(row.date)
            .or_insert_with(|| MarketDay::new(row.date));
        if day.closes.contains_key(&row.symbol) {
            return Err(LoadError::Duplicate {
                date: row.date,
                id: row.symbol,
            });
        }
        if let Some(div) = row.dividend {
            day.dividends.insert(row.symbol.clone(), div);
        }
        if let Some(k) = row.split {
            day.splits.insert(row.symbol.clone(), k);
        }
        day.closes.insert(row.symbol, row.close.unwrap_or(f64::NAN));
    }

    // dates are unique keys, so the panel cannot reject them
    PricePanel::new(days.into_values().collect()).map_err(|e| LoadError::BadRow {
        line: 0,
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

pub fn load_targets(path: impl AsRef<Path>) -> Result<StaticTargets<f64>, LoadError> {
    parse_targets(File::open(path)?)
}

pub fn parse_targets<R: Read>(input: R) -> Result<StaticTargets<f64>, LoadError> {
    let mut days: BTreeMap<NaiveDate, TargetDay<f64>> = BTreeMap::new();

    for (line, row) in rows::<_, TargetRow>(input)? {
        if row.id.is_empty() {
            return Err(LoadError::BadRow {
                line,
                reason: "id is empty".to_string(),
            });
        }
        let day = days
            .entry(row.date)
            .or_insert_with(|| TargetDay::new(row.date));
        if day.sizes.contains_key(&row.id) {
            return Err(LoadError::Duplicate {
                date: row.date,
                id: row.id,
            });
        }
        if let Some(px) = row.exec_price {
            day.exec_prices.insert(row.id.clone(), px);
        }
        day.sizes.insert(row.id, row.dollar_size);
    }
    Ok(StaticTargets::new(days.into_values()))
}

pub fn load_basket_targets(path: impl AsRef<Path>) -> Result<StaticTargets<BasketTarget>, LoadError> {
    parse_basket_targets(File::open(path)?)
}

pub fn parse_basket_targets<R: Read>(input: R) -> Result<StaticTargets<BasketTarget>, LoadError> {
    let mut days: BTreeMap<NaiveDate, TargetDay<BasketTarget>> = BTreeMap::new();

    for (line, row) in rows::<_, BasketRow>(input)? {
        let legs: Vec<String> = row.legs.split('|').map(|s| s.trim().to_string()).collect();
        if legs.iter().any(String::is_empty) {
            return Err(LoadError::BadRow {
                line,
                reason: format!("empty leg in '{}'", row.legs),
            });
        }
        let sizes = row
            .dollar_sizes
            .split('|')
            .map(|s| s.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| LoadError::BadRow {
                line,
                reason: format!("dollar_sizes '{}': {e}", row.dollar_sizes),
            })?;
        if sizes.len() != legs.len() {
            return Err(LoadError::BadRow {
                line,
                reason: format!("{} legs but {} dollar sizes", legs.len(), sizes.len()),
            });
        }

        let target = BasketTarget::new(legs, sizes);
        let key = target.key();
        let day = days
            .entry(row.date)
            .or_insert_with(|| TargetDay::new(row.date));
        if day.sizes.contains_key(&key) {
            return Err(LoadError::Duplicate {
                date: row.date,
                id: key,
            });
        }
        day.sizes.insert(key, target);
    }
    Ok(StaticTargets::new(days.into_values()))
}
