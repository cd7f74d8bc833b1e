//! Candle loading from CSV files, plain or zstd-compressed.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. Timestamps are
//! RFC 3339 or `%Y-%m-%d %H:%M:%S` (taken as UTC).

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::types::Candle;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("Failed to parse timestamp: {}", raw))?;
    Ok(naive.and_utc())
}

/// Parse candles from any CSV reader. Output is sorted and unique by
/// timestamp; rows with inconsistent OHLC are skipped.
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let mut candles = Vec::new();
    let mut skipped = 0usize;

    for (line, result) in csv_reader.deserialize().enumerate() {
        let row: CsvRow = result.with_context(|| format!("Failed to parse CSV row {}", line + 1))?;
        let candle = Candle {
            timestamp: parse_timestamp(&row.timestamp)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };

        if !candle.is_well_formed() {
            warn!("Skipping malformed candle at {}: {:?}", candle.timestamp, candle);
            skipped += 1;
            continue;
        }
        candles.push(candle);
    }

    candles.sort_by_key(|c| c.timestamp);
    let before = candles.len();
    candles.dedup_by_key(|c| c.timestamp);

    debug!(
        "Loaded {} candles ({} malformed, {} duplicates dropped)",
        candles.len(),
        skipped,
        before - candles.len()
    );

    Ok(candles)
}

/// Load candles from a `.csv` or `.csv.zst` file.
pub fn load_candles(path: &Path) -> Result<Vec<Candle>> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;

    if path.extension().map_or(false, |ext| ext == "zst") {
        let decoder = zstd::stream::Decoder::new(file)
            .with_context(|| format!("Failed to create zstd decoder for: {:?}", path))?;
        read_candles(BufReader::new(decoder)).with_context(|| format!("Failed to read candles from {:?}", path))
    } else {
        read_candles(BufReader::new(file)).with_context(|| format!("Failed to read candles from {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "timestamp,open,high,low,close,volume
2025-11-21T00:02:00Z,1.1002,1.1006,1.1000,1.1004,12
2025-11-21 00:00:00,1.1000,1.1003,1.0998,1.1001,10
2025-11-21T00:01:00+00:00,1.1001,1.1004,1.0999,1.1002,8
2025-11-21T00:01:00Z,1.1001,1.1004,1.0999,1.1002,8
2025-11-21T00:03:00Z,1.1004,1.1003,1.1000,1.1001,5
";

    #[test]
    fn test_read_sorts_dedups_and_skips_malformed() {
        let candles = read_candles(SAMPLE.as_bytes()).unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].open, 1.1000);
        assert_eq!(candles[0].volume, 10.0);
        assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let csv = "timestamp,open,high,low,close,volume\nyesterday,1,2,0.5,1.5,1\n";
        assert!(read_candles(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_load_zstd_file() {
        let path = std::env::temp_dir().join(format!("pa_engine_loader_{}.csv.zst", std::process::id()));
        let compressed = zstd::encode_all(SAMPLE.as_bytes(), 3).unwrap();
        std::fs::write(&path, compressed).unwrap();

        let candles = load_candles(&path).unwrap();
        assert_eq!(candles.len(), 3);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_candles(Path::new("/nonexistent/candles.csv")).is_err());
    }
}
