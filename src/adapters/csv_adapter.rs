//! CSV price bar adapter: one `{symbol}.csv` file per symbol.

use crate::domain::error::OptraderError;
use crate::domain::ohlcv::{PriceBar, parse_timestamp};
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One bar as stored on disk. Accepts lower-case or capitalised headers.
#[derive(Debug, Deserialize)]
pub(crate) struct RawBar {
    #[serde(alias = "Date", alias = "date", alias = "Timestamp", alias = "datetime")]
    timestamp: String,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(default, alias = "Volume")]
    volume: f64,
}

impl RawBar {
    pub(crate) fn into_bar(self, row: usize) -> Result<PriceBar, OptraderError> {
        let timestamp =
            parse_timestamp(&self.timestamp).ok_or_else(|| OptraderError::DataFormat {
                reason: format!("row {row}: invalid timestamp '{}'", self.timestamp),
            })?;
        Ok(PriceBar {
            timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

pub(crate) fn in_range(
    bar: &PriceBar,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> bool {
    start.is_none_or(|s| bar.timestamp >= s) && end.is_none_or(|e| bar.timestamp <= e)
}

/// Symbols for which `dir` holds a `{symbol}.{extension}` file, sorted.
pub(crate) fn symbols_in(dir: &Path, extension: &str) -> Result<Vec<String>, OptraderError> {
    let mut symbols = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }
    }
    symbols.sort();
    Ok(symbols)
}

pub(crate) fn range_of(bars: &[PriceBar]) -> Option<(NaiveDateTime, NaiveDateTime, usize)> {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
        _ => None,
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<PriceBar>, OptraderError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Err(OptraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut bars = Vec::new();
        for (i, record) in rdr.deserialize::<RawBar>().enumerate() {
            let raw = record.map_err(|e| OptraderError::DataFormat {
                reason: format!("{}: {e}", path.display()),
            })?;
            bars.push(raw.into_bar(i + 1)?);
        }
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<PriceBar>, OptraderError> {
        let bars: Vec<PriceBar> = self
            .read_all(symbol)?
            .into_iter()
            .filter(|b| in_range(b, start, end))
            .collect();
        if bars.is_empty() {
            return Err(OptraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, OptraderError> {
        symbols_in(&self.base_path, "csv")
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, OptraderError> {
        match self.read_all(symbol) {
            Ok(bars) => Ok(range_of(&bars)),
            Err(OptraderError::NoData { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
