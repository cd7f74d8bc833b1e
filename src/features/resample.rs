//! OHLCV aggregation into coarser timeframes.

use chrono::{DateTime, Utc};

use crate::types::{Candle, Timeframe};

fn bucket_start(ts: DateTime<Utc>, tf_secs: i64) -> Option<DateTime<Utc>> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(tf_secs), 0)
}

/// Bucket candles by `floor(timestamp / timeframe)`. Input must be sorted;
/// empty buckets never appear in the output.
pub fn resample(candles: &[Candle], timeframe: Timeframe) -> Vec<Candle> {
    let tf_secs = timeframe.minutes() * 60;
    let mut out: Vec<Candle> = Vec::new();

    for c in candles {
        let Some(start) = bucket_start(c.timestamp, tf_secs) else {
            continue;
        };
        match out.last_mut() {
            Some(bar) if bar.timestamp == start => {
                bar.high = bar.high.max(c.high);
                bar.low = bar.low.min(c.low);
                bar.close = c.close;
                bar.volume += c.volume;
            }
            _ => out.push(Candle {
                timestamp: start,
                ..*c
            }),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candle, ts};

    #[test]
    fn test_resample_m1_to_m5() {
        let candles: Vec<Candle> = (0..12)
            .map(|i| candle(i, 100.0 + i as f64, 101.0 + i as f64, 99.0 + i as f64, 100.5 + i as f64))
            .collect();
        let bars = resample(&candles, Timeframe::M5);

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, ts(0));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 105.0);
        assert_eq!(bars[0].low, 99.0);
        assert_eq!(bars[0].close, 104.5);
        assert_eq!(bars[0].volume, 5.0);
        assert_eq!(bars[1].timestamp, ts(5));
        // Partial last bucket
        assert_eq!(bars[2].timestamp, ts(10));
        assert_eq!(bars[2].volume, 2.0);
    }

    #[test]
    fn test_gaps_produce_no_empty_buckets() {
        let candles = vec![candle(0, 1.0, 1.0, 1.0, 1.0), candle(30, 2.0, 2.0, 2.0, 2.0)];
        let bars = resample(&candles, Timeframe::M5);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp, ts(30));
    }

    #[test]
    fn test_m1_is_identity() {
        let candles: Vec<Candle> = (0..4).map(|i| candle(i, 1.0, 2.0, 0.5, 1.5)).collect();
        assert_eq!(resample(&candles, Timeframe::M1), candles);
    }
}
