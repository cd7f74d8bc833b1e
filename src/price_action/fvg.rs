//! Fair Value Gap (3-candle imbalance) detection
//!
//! Bullish: low[i+2] > high[i], gap = [high[i], low[i+2]]
//! Bearish: high[i+2] < low[i], gap = [high[i+2], low[i]]
//!
//! Detection leaves every gap unfilled; `mark_fills` is the single annotate
//! step that sets `filled_at` from a forward scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::types::{CandleFrame, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FvgDirection {
    #[serde(rename = "BULLISH")]
    Bullish,
    #[serde(rename = "BEARISH")]
    Bearish,
}

impl fmt::Display for FvgDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FvgDirection::Bullish => write!(f, "BULLISH"),
            FvgDirection::Bearish => write!(f, "BEARISH"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FvgConfig {
    /// Minimum gap size in ATR units. 0 disables filtering.
    pub min_size_atr: f64,
    /// Candles averaged for the pseudo-ATR when no ATR column exists
    pub fallback_range_bars: usize,
}

impl Default for FvgConfig {
    fn default() -> Self {
        Self {
            min_size_atr: 0.0,
            fallback_range_bars: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub timeframe: Option<Timeframe>,
    pub direction: FvgDirection,

    pub start_position: usize,
    pub mid_position: usize,
    pub end_position: usize,
    pub start_timestamp: DateTime<Utc>,
    pub mid_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,

    pub gap_low: f64,
    pub gap_high: f64,
    pub size_abs: f64,
    /// Size in ATR units, `None` when no volatility value was available
    pub size_atr: Option<f64>,

    pub filled_at: Option<DateTime<Utc>>,
}

impl FairValueGap {
    pub fn is_filled(&self) -> bool {
        self.filled_at.is_some()
    }

    pub fn midpoint(&self) -> f64 {
        (self.gap_low + self.gap_high) / 2.0
    }
}

/// Detect all 3-candle gaps, unfilled.
pub fn detect_fvgs(frame: &CandleFrame, timeframe: Option<Timeframe>, config: &FvgConfig) -> Vec<FairValueGap> {
    let candles = &frame.candles;
    if candles.len() < 3 {
        return Vec::new();
    }

    // Without an ATR column the whole frame shares one pseudo-ATR
    let fallback = match frame.atr {
        Some(_) => None,
        None => frame.mean_range(config.fallback_range_bars),
    };

    let mut gaps = Vec::new();
    for i in 0..candles.len() - 2 {
        let (c1, c2, c3) = (&candles[i], &candles[i + 1], &candles[i + 2]);

        let (direction, gap_low, gap_high) = if c3.low > c1.high {
            (FvgDirection::Bullish, c1.high, c3.low)
        } else if c3.high < c1.low {
            (FvgDirection::Bearish, c3.high, c1.low)
        } else {
            continue;
        };

        let size_abs = gap_high - gap_low;
        let volatility = match frame.atr {
            Some(_) => frame.atr_at(i + 1),
            None => fallback,
        };
        let size_atr = volatility.filter(|v| *v > 0.0).map(|v| size_abs / v);

        if config.min_size_atr > 0.0 {
            if let Some(s) = size_atr {
                if s < config.min_size_atr {
                    continue;
                }
            }
        }

        gaps.push(FairValueGap {
            timeframe,
            direction,
            start_position: i,
            mid_position: i + 1,
            end_position: i + 2,
            start_timestamp: c1.timestamp,
            mid_timestamp: c2.timestamp,
            end_timestamp: c3.timestamp,
            gap_low,
            gap_high,
            size_abs,
            size_atr,
            filled_at: None,
        });
    }

    debug!("Detected {} FVGs for {:?}", gaps.len(), timeframe);
    gaps
}

/// Set `filled_at` to the first candle after the gap that trades through it.
/// Gaps already marked keep their fill.
pub fn mark_fills(frame: &CandleFrame, gaps: Vec<FairValueGap>) -> Vec<FairValueGap> {
    gaps.into_iter()
        .map(|mut gap| {
            if gap.filled_at.is_none() {
                let mut after = frame.candles.iter().skip(gap.end_position + 1);
                gap.filled_at = match gap.direction {
                    FvgDirection::Bullish => after.find(|c| c.low <= gap.gap_low),
                    FvgDirection::Bearish => after.find(|c| c.high >= gap.gap_high),
                }
                .map(|c| c.timestamp);
            }
            gap
        })
        .collect()
}
