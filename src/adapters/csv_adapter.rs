//! CSV file market data adapter.
//!
//! One file per symbol in a base directory: `<SYMBOL>.csv` for daily bars,
//! `<SYMBOL>_<timeframe>.csv` for intraday bars (falling back to
//! `<SYMBOL>.csv`). Header: `timestamp,open,high,low,close,volume`, with
//! timestamps as `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;

use crate::domain::error::TrendsimError;
use crate::domain::price_bar::{PriceBar, Timeframe};
use crate::ports::data_port::MarketDataPort;

pub struct CsvMarketData {
    base_path: PathBuf,
}

impl CsvMarketData {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> Option<PathBuf> {
        let daily = self.base_path.join(format!("{}.csv", symbol));
        if timeframe != Timeframe::Day {
            let intraday = self.base_path.join(format!("{}_{}.csv", symbol, timeframe));
            if intraday.is_file() {
                return Some(intraday);
            }
        }
        daily.is_file().then_some(daily)
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn field<'a>(record: &'a StringRecord, index: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| format!("missing {} column", name))
}

fn parse_record(record: &StringRecord) -> Result<PriceBar, String> {
    let raw = field(record, 0, "timestamp")?;
    let timestamp =
        parse_timestamp(raw).ok_or_else(|| format!("invalid timestamp '{}'", raw))?;

    let number = |index: usize, name: &str| -> Result<f64, String> {
        let raw = field(record, index, name)?;
        raw.parse::<f64>()
            .map_err(|e| format!("invalid {} value '{}': {}", name, raw, e))
    };

    let raw_volume = field(record, 5, "volume")?;
    let volume = raw_volume
        .parse::<f64>()
        .map_err(|e| format!("invalid volume value '{}': {}", raw_volume, e))?;

    Ok(PriceBar {
        timestamp,
        open: number(1, "open")?,
        high: number(2, "high")?,
        low: number(3, "low")?,
        close: number(4, "close")?,
        volume: volume.max(0.0) as u64,
    })
}

impl MarketDataPort for CsvMarketData {
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, TrendsimError> {
        let unavailable = |reason: String| TrendsimError::DataUnavailable {
            symbol: symbol.to_string(),
            start,
            end,
            reason,
        };

        let path = self
            .csv_path(symbol, timeframe)
            .ok_or_else(|| TrendsimError::SymbolNotFound {
                symbol: symbol.to_string(),
                start,
                end,
            })?;
        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record =
                result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;
            let bar = parse_record(&record)
                .map_err(|e| unavailable(format!("row {}: {}", line + 2, e)))?;

            let date = bar.date();
            if date < start || date > end {
                continue;
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.timestamp);
        tracing::debug!(symbol, bars = bars.len(), path = %path.display(), "loaded bars");
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, TrendsimError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".csv") {
                if !stem.contains('_') {
                    symbols.push(stem.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
