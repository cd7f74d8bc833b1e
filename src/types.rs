//! Shared candle and timeframe types consumed by every engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PaError;

/// One OHLCV candle. Timestamps are UTC and strictly increasing within a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body_low(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn body_high(&self) -> f64 {
        self.open.max(self.close)
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// low <= {open, close} <= high
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }
}

/// A named per-candle indicator column (e.g. `atr_14`, `ema_50`).
///
/// `None` marks rows where the indicator is not defined yet (warm-up).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl IndicatorColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Value at a row, with non-finite values treated as missing.
    pub fn get(&self, idx: usize) -> Option<f64> {
        self.values
            .get(idx)
            .copied()
            .flatten()
            .filter(|v| v.is_finite())
    }

    pub fn last(&self) -> Option<f64> {
        self.values.len().checked_sub(1).and_then(|i| self.get(i))
    }
}

/// Candle series plus the optional columns attached by feature engineering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleFrame {
    pub candles: Vec<Candle>,
    /// Volatility column (ATR)
    pub atr: Option<IndicatorColumn>,
    /// Moving-average column used for trend confirmation
    pub ema: Option<IndicatorColumn>,
    /// Per-candle session labels
    pub sessions: Option<Vec<Session>>,
}

impl CandleFrame {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn atr_at(&self, idx: usize) -> Option<f64> {
        self.atr.as_ref().and_then(|col| col.get(idx))
    }

    pub fn session_at(&self, idx: usize) -> Option<Session> {
        self.sessions.as_ref().and_then(|s| s.get(idx).copied())
    }

    /// Mean high-low range of the last `n` candles, the stand-in volatility
    /// when no ATR column is attached.
    pub fn mean_range(&self, n: usize) -> Option<f64> {
        let start = self.candles.len().saturating_sub(n);
        let tail = &self.candles[start..];
        if tail.is_empty() {
            return None;
        }
        Some(tail.iter().map(Candle::range).sum::<f64>() / tail.len() as f64)
    }
}

/// Timeframe tag, ordered finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = PaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_uppercase();
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == tag)
            .ok_or_else(|| PaError::UnknownTimeframeTag(s.to_string()))
    }
}

/// FX trading session label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Session {
    #[serde(rename = "ASIA")]
    Asia,
    #[serde(rename = "LONDON")]
    London,
    #[serde(rename = "NY_OVERLAP")]
    NyOverlap,
    #[serde(rename = "NY")]
    NewYork,
    #[serde(rename = "OTHER")]
    Other,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Asia => write!(f, "ASIA"),
            Session::London => write!(f, "LONDON"),
            Session::NyOverlap => write!(f, "NY_OVERLAP"),
            Session::NewYork => write!(f, "NY"),
            Session::Other => write!(f, "OTHER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parse_and_order() {
        assert_eq!("m15".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert_eq!(" H1 ".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert!("M7".parse::<Timeframe>().is_err());
        assert!(Timeframe::M1 < Timeframe::M5);
        assert!(Timeframe::H1 < Timeframe::D1);
        assert_eq!(Timeframe::H4.minutes(), 240);
    }

    #[test]
    fn test_indicator_column_ignores_nan() {
        let col = IndicatorColumn::new("atr_14", vec![None, Some(f64::NAN), Some(1.5)]);
        assert_eq!(col.get(0), None);
        assert_eq!(col.get(1), None);
        assert_eq!(col.get(2), Some(1.5));
        assert_eq!(col.get(9), None);
        assert_eq!(col.last(), Some(1.5));
    }

    #[test]
    fn test_session_serializes_as_label() {
        let json = serde_json::to_string(&Session::NyOverlap).unwrap();
        assert_eq!(json, "\"NY_OVERLAP\"");
        assert_eq!(Session::Asia.to_string(), "ASIA");
    }
}
