//! JSON price bar adapter: one `{symbol}.json` file per symbol, either a
//! bare array of bars or an exchange dump with the bars under `"ohlcv"`.

use crate::adapters::csv_adapter::{RawBar, in_range, range_of, symbols_in};
use crate::domain::error::OptraderError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Deserialize)]
#[serde(untagged)]
enum BarDocument {
    Dump { ohlcv: Vec<RawBar> },
    Bare(Vec<RawBar>),
}

pub struct JsonDataAdapter {
    base_path: PathBuf,
}

impl JsonDataAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<PriceBar>, OptraderError> {
        let path = self.base_path.join(format!("{symbol}.json"));
        if !path.exists() {
            return Err(OptraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;
        let document: BarDocument =
            serde_json::from_str(&content).map_err(|e| OptraderError::DataFormat {
                reason: format!("{}: {e}", path.display()),
            })?;
        let raw = match document {
            BarDocument::Dump { ohlcv } => ohlcv,
            BarDocument::Bare(bars) => bars,
        };
        raw.into_iter()
            .enumerate()
            .map(|(i, r)| r.into_bar(i + 1))
            .collect()
    }
}

impl DataPort for JsonDataAdapter {
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
        symbols_in(&self.base_path, "json")
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::parse_timestamp;
    use tempfile::TempDir;

    const DUMP: &str = r#"{
        "asset": "ETH",
        "timeframe": "30m",
        "ohlcv": [
            {"Date": "2024-06-01T00:00:00+00:00", "Open": 3800.0, "High": 3810.5,
             "Low": 3790.0, "Close": 3805.25, "Volume": 12.5},
            {"Date": "2024-06-01T00:30:00+00:00", "Open": 3805.25, "High": 3820.0,
             "Low": 3800.0, "Close": 3815.0, "Volume": 9.0}
        ]
    }"#;

    #[test]
    fn reads_exchange_dump() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ETH.json"), DUMP).unwrap();
        let adapter = JsonDataAdapter::new(dir.path().to_path_buf());

        let bars = adapter.fetch_bars("ETH", None, None).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, parse_timestamp("2024-06-01T00:00:00").unwrap());
        assert_eq!(bars[1].close, 3815.0);
        assert_eq!(adapter.list_symbols().unwrap(), vec!["ETH"]);
    }

    #[test]
    fn reads_bare_array() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("SPX.json"),
            r#"[{"timestamp": "2024-06-03", "open": 1, "high": 2, "low": 0.5, "close": 1.5}]"#,
        )
        .unwrap();
        let adapter = JsonDataAdapter::new(dir.path().to_path_buf());
        let (first, last, count) = adapter.get_data_range("SPX").unwrap().unwrap();
        assert_eq!(first, last);
        assert_eq!(count, 1);
    }

    #[test]
    fn malformed_document_is_a_format_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("BAD.json"), r#"{"rows": []}"#).unwrap();
        let adapter = JsonDataAdapter::new(dir.path().to_path_buf());
        assert!(matches!(
            adapter.fetch_bars("BAD", None, None),
            Err(OptraderError::DataFormat { .. })
        ));
    }
}
