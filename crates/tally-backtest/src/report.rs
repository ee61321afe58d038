use std::io::Write;
use std::path::Path;

use crate::engine::{BacktestError, DayObserver};
use crate::types::DailyRow;

/// Write daily rows as CSV (header + one line per day).
pub fn write_records_csv(path: impl AsRef<Path>, rows: &[DailyRow]) -> Result<(), BacktestError> {
    let mut w = csv::Writer::from_path(path).map_err(output)?;
    for row in rows {
        w.serialize(row).map_err(output)?;
    }
    w.flush().map_err(|e| BacktestError::Output(e.to_string()))
}

fn output(e: csv::Error) -> BacktestError {
    BacktestError::Output(e.to_string())
}

/// Observer that appends each committed day to a CSV sink and flushes it,
/// so a cancelled or failed run leaves every completed day on disk.
pub struct CsvRowSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> CsvRowSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W, BacktestError> {
        self.writer
            .into_inner()
            .map_err(|e| BacktestError::Output(e.to_string()))
    }
}

impl<W: Write> DayObserver for CsvRowSink<W> {
    fn on_day(&mut self, row: &DailyRow) -> Result<(), BacktestError> {
        self.writer.serialize(row).map_err(output)?;
        self.writer
            .flush()
            .map_err(|e| BacktestError::Output(e.to_string()))?;
        self.rows += 1;
        Ok(())
    }
}
