//! Order Block detection and scoring
//!
//! 1. Break of Structure (BOS): a HIGH swing labeled HH breaks the previous
//!    swing high (UP); a LOW swing labeled LL breaks the previous swing low
//!    (DOWN).
//! 2. Origin: the last opposite-colored candle before the break, searched
//!    backward within `max_lookback_bars`. Bearish candle before an UP break
//!    = DEMAND block, bullish candle before a DOWN break = SUPPLY block.
//! 3. Scoring is a separate pass that returns new values:
//!    trend alignment (30/5/10) + freshness (25 → 0 over 300 bars)
//!    + ATR distance (30/20/10/0) + unmitigated bonus (15), clipped to 0..=100.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::structure::{LabeledSwingPoint, SwingKind, SwingLabel};
use super::trend::{TrendKind, TrendState};
use crate::types::{CandleFrame, Timeframe};

const TREND_ALIGNED_SCORE: f64 = 30.0;
const TREND_COUNTER_SCORE: f64 = 5.0;
const TREND_NEUTRAL_SCORE: f64 = 10.0;
const FRESHNESS_MAX_SCORE: f64 = 25.0;
const UNMITIGATED_SCORE: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakDirection {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
}

/// Structural break inferred from labeled swings. Only used to seed order blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BreakOfStructure {
    pub timestamp: DateTime<Utc>,
    pub position: usize,
    pub direction: BreakDirection,
    /// Price of the prior swing that got broken
    pub broken_level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderBlockKind {
    #[serde(rename = "DEMAND")]
    Demand,
    #[serde(rename = "SUPPLY")]
    Supply,
}

impl fmt::Display for OrderBlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBlockKind::Demand => write!(f, "DEMAND"),
            OrderBlockKind::Supply => write!(f, "SUPPLY"),
        }
    }
}

/// Additive parts of an order-block score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreComponents {
    Factors {
        trend: f64,
        freshness: f64,
        distance: f64,
        mitigation: f64,
    },
    /// The block could not be placed on the current series
    Unscorable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlockScore {
    /// Total in 0..=100
    pub value: f64,
    pub components: ScoreComponents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub timeframe: Option<Timeframe>,
    pub kind: OrderBlockKind,

    // Origin candle
    pub timestamp: DateTime<Utc>,
    pub position: usize,

    // Full candle range
    pub low: f64,
    pub high: f64,
    // Body range
    pub body_low: f64,
    pub body_high: f64,

    // Triggering break
    pub bos_timestamp: DateTime<Utc>,
    pub bos_position: usize,
    pub broken_level: f64,

    pub is_mitigated: bool,
    pub score: Option<OrderBlockScore>,
}

impl OrderBlock {
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    pub fn score_value(&self) -> f64 {
        self.score.as_ref().map_or(0.0, |s| s.value)
    }

    /// Return a copy carrying a fresh score against `frame` and `trend`.
    /// Pure: rescoring the same block on the same inputs gives the same score.
    pub fn scored(
        &self,
        frame: &CandleFrame,
        trend: Option<&TrendState>,
        config: &OrderBlockConfig,
    ) -> OrderBlock {
        let mut out = self.clone();
        out.score = Some(compute_score(frame, self, trend, config));
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBlockConfig {
    /// How many candles back from the break to search for the origin candle
    pub max_lookback_bars: usize,
    /// Age at which freshness reaches zero
    pub freshness_horizon_bars: usize,
    /// Candles averaged for the pseudo-ATR when no ATR column exists
    pub fallback_range_bars: usize,
    /// Mark blocks that price has traded back into after the break
    pub track_mitigation: bool,
}

impl Default for OrderBlockConfig {
    fn default() -> Self {
        Self {
            max_lookback_bars: 20,
            freshness_horizon_bars: 300,
            fallback_range_bars: 50,
            track_mitigation: false,
        }
    }
}

/// Single forward pass over labeled swings emitting UP/DOWN breaks.
pub(crate) fn detect_breaks(swings: &[LabeledSwingPoint]) -> Vec<BreakOfStructure> {
    let mut breaks = Vec::new();
    let mut last_high: Option<f64> = None;
    let mut last_low: Option<f64> = None;

    for s in swings {
        match s.kind() {
            SwingKind::High => {
                if let (Some(prev), Some(SwingLabel::HH)) = (last_high, s.label) {
                    breaks.push(BreakOfStructure {
                        timestamp: s.timestamp(),
                        position: s.position(),
                        direction: BreakDirection::Up,
                        broken_level: prev,
                    });
                }
                last_high = Some(s.price());
            }
            SwingKind::Low => {
                if let (Some(prev), Some(SwingLabel::LL)) = (last_low, s.label) {
                    breaks.push(BreakOfStructure {
                        timestamp: s.timestamp(),
                        position: s.position(),
                        direction: BreakDirection::Down,
                        broken_level: prev,
                    });
                }
                last_low = Some(s.price());
            }
        }
    }

    breaks
}

/// Detect unscored order blocks, one per break that has an origin candle.
pub fn detect_order_blocks(
    frame: &CandleFrame,
    swings: &[LabeledSwingPoint],
    timeframe: Option<Timeframe>,
    max_lookback_bars: usize,
) -> Vec<OrderBlock> {
    if frame.is_empty() || swings.is_empty() {
        return Vec::new();
    }

    let candles = &frame.candles;
    let n = candles.len();
    let mut blocks = Vec::new();

    for bos in detect_breaks(swings) {
        if bos.position == 0 || bos.position >= n {
            continue;
        }

        let start = bos.position.saturating_sub(max_lookback_bars);
        let (kind, origin) = match bos.direction {
            BreakDirection::Up => (
                OrderBlockKind::Demand,
                (start..bos.position).rev().find(|&i| candles[i].is_bearish()),
            ),
            BreakDirection::Down => (
                OrderBlockKind::Supply,
                (start..bos.position).rev().find(|&i| candles[i].is_bullish()),
            ),
        };

        let Some(idx) = origin else {
            continue;
        };
        let c = &candles[idx];

        blocks.push(OrderBlock {
            timeframe,
            kind,
            timestamp: c.timestamp,
            position: idx,
            low: c.low,
            high: c.high,
            body_low: c.body_low(),
            body_high: c.body_high(),
            bos_timestamp: bos.timestamp,
            bos_position: bos.position,
            broken_level: bos.broken_level,
            is_mitigated: false,
            score: None,
        });
    }

    debug!("Detected {} order blocks for {:?}", blocks.len(), timeframe);
    blocks
}

/// Flag blocks whose body has been traded into after the break.
pub fn mark_mitigation(frame: &CandleFrame, blocks: Vec<OrderBlock>) -> Vec<OrderBlock> {
    blocks
        .into_iter()
        .map(|mut ob| {
            let mut after = frame.candles.iter().skip(ob.bos_position + 1);
            ob.is_mitigated = match ob.kind {
                OrderBlockKind::Demand => after.any(|c| c.low <= ob.body_high),
                OrderBlockKind::Supply => after.any(|c| c.high >= ob.body_low),
            };
            ob
        })
        .collect()
}

fn trend_alignment(kind: OrderBlockKind, trend: Option<&TrendState>) -> f64 {
    match (trend.map(|t| t.kind), kind) {
        (Some(TrendKind::Up), OrderBlockKind::Demand) => TREND_ALIGNED_SCORE,
        (Some(TrendKind::Down), OrderBlockKind::Supply) => TREND_ALIGNED_SCORE,
        (Some(TrendKind::Up), _) | (Some(TrendKind::Down), _) => TREND_COUNTER_SCORE,
        _ => TREND_NEUTRAL_SCORE,
    }
}

fn distance_score(dist_atr: f64) -> f64 {
    if (0.5..=2.0).contains(&dist_atr) {
        30.0
    } else if (0.25..0.5).contains(&dist_atr) || (dist_atr > 2.0 && dist_atr <= 3.0) {
        20.0
    } else if (0.1..0.25).contains(&dist_atr) || (dist_atr > 3.0 && dist_atr <= 4.0) {
        10.0
    } else {
        0.0
    }
}

fn compute_score(
    frame: &CandleFrame,
    ob: &OrderBlock,
    trend: Option<&TrendState>,
    config: &OrderBlockConfig,
) -> OrderBlockScore {
    let Some(last) = frame.last() else {
        return OrderBlockScore {
            value: 0.0,
            components: ScoreComponents::Unscorable {
                reason: "empty candle series".to_string(),
            },
        };
    };
    let n = frame.len();
    if ob.position >= n {
        return OrderBlockScore {
            value: 0.0,
            components: ScoreComponents::Unscorable {
                reason: format!("origin position {} out of range for {} candles", ob.position, n),
            },
        };
    }

    let trend_score = trend_alignment(ob.kind, trend);

    let horizon = config.freshness_horizon_bars.max(1) as f64;
    let age_bars = (n - ob.position) as f64;
    let freshness_score = (FRESHNESS_MAX_SCORE * (1.0 - (age_bars / horizon).min(1.0))).max(0.0);

    let atr = match frame.atr {
        Some(_) => frame.atr_at(n - 1),
        None => frame.mean_range(config.fallback_range_bars),
    };
    let distance = match atr {
        Some(atr) if atr > 0.0 => {
            let close = last.close;
            let edge_dist = (close - ob.body_low).abs().min((close - ob.body_high).abs());
            distance_score(edge_dist / atr)
        }
        _ => 0.0,
    };

    let mitigation_score = if ob.is_mitigated { 0.0 } else { UNMITIGATED_SCORE };

    let total = (trend_score + freshness_score + distance + mitigation_score).clamp(0.0, 100.0);

    OrderBlockScore {
        value: total,
        components: ScoreComponents::Factors {
            trend: trend_score,
            freshness: freshness_score,
            distance,
            mitigation: mitigation_score,
        },
    }
}

/// Score every block and sort descending by score; ties keep their order.
pub fn score_order_blocks(
    frame: &CandleFrame,
    blocks: &[OrderBlock],
    trend: Option<&TrendState>,
    config: &OrderBlockConfig,
) -> Vec<OrderBlock> {
    let mut scored: Vec<OrderBlock> = blocks
        .iter()
        .map(|ob| ob.scored(frame, trend, config))
        .collect();
    scored.sort_by(|a, b| {
        b.score_value()
            .partial_cmp(&a.score_value())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}
