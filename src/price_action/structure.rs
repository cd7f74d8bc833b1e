//! Swing detection and market-structure labeling
//!
//! A swing HIGH at `i` has a high strictly above every high in the `left`
//! candles before it and at least as high as every high in the `right`
//! candles after it. Swing LOWs mirror this on lows. One candle can be both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::types::{Candle, CandleFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwingKind {
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "LOW")]
    Low,
}

impl fmt::Display for SwingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwingKind::High => write!(f, "HIGH"),
            SwingKind::Low => write!(f, "LOW"),
        }
    }
}

/// Label relative to the previous swing of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwingLabel {
    HH, // Higher (or equal) high
    LH, // Lower high
    HL, // Higher (or equal) low
    LL, // Lower low
}

impl fmt::Display for SwingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwingLabel::HH => write!(f, "HH"),
            SwingLabel::LH => write!(f, "LH"),
            SwingLabel::HL => write!(f, "HL"),
            SwingLabel::LL => write!(f, "LL"),
        }
    }
}

/// Window sizes for fractal swing detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingConfig {
    /// Candles required before the swing candle
    pub left: usize,
    /// Candles required after the swing candle
    pub right: usize,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self { left: 2, right: 2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub kind: SwingKind,
    /// Offset into the candle series
    pub position: usize,
    /// max(left, right) window used to confirm it
    pub strength: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledSwingPoint {
    #[serde(flatten)]
    pub swing: SwingPoint,
    /// `None` for the first swing of each kind
    pub label: Option<SwingLabel>,
}

impl LabeledSwingPoint {
    pub fn kind(&self) -> SwingKind {
        self.swing.kind
    }

    pub fn price(&self) -> f64 {
        self.swing.price
    }

    pub fn position(&self) -> usize {
        self.swing.position
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.swing.timestamp
    }
}

/// Detect fractal swing highs and lows, ordered by position.
///
/// A series too short for one full window yields no swings. A zero-width
/// window never confirms a swing.
pub fn detect_swings(candles: &[Candle], left: usize, right: usize) -> Vec<SwingPoint> {
    let mut swings = Vec::new();

    if left == 0 || right == 0 || candles.len() <= left + right {
        return swings;
    }

    let strength = left.max(right);

    for i in left..candles.len() - right {
        let c = &candles[i];
        let before = &candles[i - left..i];
        let after = &candles[i + 1..=i + right];

        let left_high = before.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let right_high = after.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let left_low = before.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let right_low = after.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

        if c.high > left_high && c.high >= right_high {
            swings.push(SwingPoint {
                timestamp: c.timestamp,
                price: c.high,
                kind: SwingKind::High,
                position: i,
                strength,
            });
        }

        if c.low < left_low && c.low <= right_low {
            swings.push(SwingPoint {
                timestamp: c.timestamp,
                price: c.low,
                kind: SwingKind::Low,
                position: i,
                strength,
            });
        }
    }

    debug!(
        "Detected {} swings over {} candles (left={}, right={})",
        swings.len(),
        candles.len(),
        left,
        right
    );

    swings
}

/// Label each swing against the previous swing of the same kind (`>=` counts
/// as higher).
pub fn label_swings(swings: &[SwingPoint]) -> Vec<LabeledSwingPoint> {
    let mut last_high: Option<f64> = None;
    let mut last_low: Option<f64> = None;

    swings
        .iter()
        .map(|s| {
            let label = match s.kind {
                SwingKind::High => {
                    let label = last_high.map(|prev| {
                        if s.price >= prev {
                            SwingLabel::HH
                        } else {
                            SwingLabel::LH
                        }
                    });
                    last_high = Some(s.price);
                    label
                }
                SwingKind::Low => {
                    let label = last_low.map(|prev| {
                        if s.price >= prev {
                            SwingLabel::HL
                        } else {
                            SwingLabel::LL
                        }
                    });
                    last_low = Some(s.price);
                    label
                }
            };

            LabeledSwingPoint { swing: *s, label }
        })
        .collect()
}

/// Detect and label in one go.
pub fn labeled_swings(frame: &CandleFrame, config: &SwingConfig) -> Vec<LabeledSwingPoint> {
    label_swings(&detect_swings(&frame.candles, config.left, config.right))
}
