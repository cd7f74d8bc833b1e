//! Liquidity levels and sweeps
//!
//! Levels come from two places:
//!   - clusters of equal swing highs / lows (anchor-based, absolute tolerance)
//!   - the Asia session high / low of the latest calendar date
//!
//! A sweep is a single candle that wicks through a level and closes back on
//! the other side of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::structure::{LabeledSwingPoint, SwingKind};
use crate::types::{CandleFrame, Session};

const DEPTH_WEIGHT: f64 = 0.35;
const RECLAIM_WEIGHT: f64 = 0.35;
const DISPLACEMENT_WEIGHT: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidityKind {
    #[serde(rename = "EQUAL_HIGH")]
    EqualHigh,
    #[serde(rename = "EQUAL_LOW")]
    EqualLow,
    #[serde(rename = "ASIA_HIGH")]
    AsiaHigh,
    #[serde(rename = "ASIA_LOW")]
    AsiaLow,
}

impl fmt::Display for LiquidityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiquidityKind::EqualHigh => write!(f, "EQUAL_HIGH"),
            LiquidityKind::EqualLow => write!(f, "EQUAL_LOW"),
            LiquidityKind::AsiaHigh => write!(f, "ASIA_HIGH"),
            LiquidityKind::AsiaLow => write!(f, "ASIA_LOW"),
        }
    }
}

/// BUY_SIDE takes out highs, SELL_SIDE takes out lows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SweepSide {
    #[serde(rename = "BUY_SIDE")]
    BuySide,
    #[serde(rename = "SELL_SIDE")]
    SellSide,
}

impl fmt::Display for SweepSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepSide::BuySide => write!(f, "BUY_SIDE"),
            SweepSide::SellSide => write!(f, "SELL_SIDE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityLevel {
    /// Last touch for clusters, extreme candle for session levels
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub kind: LiquidityKind,
    pub touches: usize,
    /// Candle positions of the contributing swings (empty for session levels)
    pub swing_positions: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub position: usize,
    pub timestamp: DateTime<Utc>,
    pub level: Arc<LiquidityLevel>,
    pub side: SweepSide,
    /// Closed back through the level
    pub reclaimed: bool,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidityConfig {
    /// Max price distance from the cluster anchor
    pub tolerance_abs: f64,
    pub min_touches: usize,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            tolerance_abs: 0.0005,
            min_touches: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Candles scanned back from the end of the series
    pub lookback_bars: usize,
    /// Candles after the sweep used for displacement
    pub lookahead_bars: usize,
    /// Normalizer used when no ATR value is available
    pub fallback_volatility: f64,
    /// Score BUY_SIDE sweeps too (mirror of the SELL_SIDE formula)
    pub score_buy_side: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            lookback_bars: 200,
            lookahead_bars: 3,
            fallback_volatility: 0.0005,
            score_buy_side: false,
        }
    }
}

fn cluster_swings(
    swings: &[&LabeledSwingPoint],
    kind: LiquidityKind,
    config: &LiquidityConfig,
    levels: &mut Vec<LiquidityLevel>,
) {
    let mut sorted: Vec<&LabeledSwingPoint> = swings.to_vec();
    sorted.sort_by(|a, b| a.price().partial_cmp(&b.price()).unwrap_or(std::cmp::Ordering::Equal));

    let flush = |cluster: &[&LabeledSwingPoint], levels: &mut Vec<LiquidityLevel>| {
        if cluster.is_empty() || cluster.len() < config.min_touches {
            return;
        }
        let price = cluster.iter().map(|s| s.price()).sum::<f64>() / cluster.len() as f64;
        let last = cluster[cluster.len() - 1];
        levels.push(LiquidityLevel {
            timestamp: last.timestamp(),
            price,
            kind,
            touches: cluster.len(),
            swing_positions: cluster.iter().map(|s| s.position()).collect(),
        });
    };

    let mut cluster: Vec<&LabeledSwingPoint> = Vec::new();
    for s in sorted {
        let outside = cluster
            .first()
            .is_some_and(|anchor| (s.price() - anchor.price()).abs() > config.tolerance_abs);
        if outside {
            flush(&cluster, levels);
            cluster.clear();
        }
        cluster.push(s);
    }
    flush(&cluster, levels);
}

/// Cluster equal highs and equal lows. Highs come first, each group in
/// ascending price order.
pub fn detect_equal_highs_lows(swings: &[LabeledSwingPoint], config: &LiquidityConfig) -> Vec<LiquidityLevel> {
    let highs: Vec<&LabeledSwingPoint> = swings.iter().filter(|s| s.kind() == SwingKind::High).collect();
    let lows: Vec<&LabeledSwingPoint> = swings.iter().filter(|s| s.kind() == SwingKind::Low).collect();

    let mut levels = Vec::new();
    cluster_swings(&highs, LiquidityKind::EqualHigh, config, &mut levels);
    cluster_swings(&lows, LiquidityKind::EqualLow, config, &mut levels);

    debug!(
        "Clustered {} swings into {} equal high/low levels",
        swings.len(),
        levels.len()
    );
    levels
}

/// Asia session high/low of the latest calendar date in the frame.
/// Needs session labels; an unlabeled frame or a day without Asia candles
/// gives nothing.
pub fn detect_asia_range_liquidity(frame: &CandleFrame) -> Vec<LiquidityLevel> {
    let (Some(sessions), Some(last)) = (frame.sessions.as_ref(), frame.last()) else {
        return Vec::new();
    };
    let day = last.timestamp.date_naive();

    let mut high: Option<(f64, DateTime<Utc>)> = None;
    let mut low: Option<(f64, DateTime<Utc>)> = None;

    for (c, session) in frame.candles.iter().zip(sessions) {
        if *session != Session::Asia || c.timestamp.date_naive() != day {
            continue;
        }
        if high.map_or(true, |(h, _)| c.high > h) {
            high = Some((c.high, c.timestamp));
        }
        if low.map_or(true, |(l, _)| c.low < l) {
            low = Some((c.low, c.timestamp));
        }
    }

    let (Some((hi, hi_ts)), Some((lo, lo_ts))) = (high, low) else {
        return Vec::new();
    };

    vec![
        LiquidityLevel {
            timestamp: hi_ts,
            price: hi,
            kind: LiquidityKind::AsiaHigh,
            touches: 1,
            swing_positions: Vec::new(),
        },
        LiquidityLevel {
            timestamp: lo_ts,
            price: lo,
            kind: LiquidityKind::AsiaLow,
            touches: 1,
            swing_positions: Vec::new(),
        },
    ]
}

/// Scan the last `lookback_bars` candles for sweeps of every level, in level
/// order then candle order.
pub fn detect_sweeps(
    frame: &CandleFrame,
    levels: &[Arc<LiquidityLevel>],
    config: &SweepConfig,
) -> Vec<LiquiditySweep> {
    if frame.is_empty() || levels.is_empty() {
        return Vec::new();
    }

    let start = frame.len().saturating_sub(config.lookback_bars);
    let mut sweeps = Vec::new();

    for level in levels {
        let price = level.price;
        for (pos, c) in frame.candles.iter().enumerate().skip(start) {
            let mut sides = Vec::with_capacity(2);
            if c.high > price && c.close < price {
                sides.push(SweepSide::BuySide);
            }
            if c.low < price && c.close > price {
                sides.push(SweepSide::SellSide);
            }

            for side in sides {
                let mut sweep = LiquiditySweep {
                    position: pos,
                    timestamp: c.timestamp,
                    level: Arc::clone(level),
                    side,
                    reclaimed: true,
                    high: c.high,
                    low: c.low,
                    close: c.close,
                    score: None,
                };
                if side == SweepSide::SellSide || config.score_buy_side {
                    sweep.score = Some(score_sweep(frame, &sweep, config));
                }
                sweeps.push(sweep);
            }
        }
    }

    debug!("Detected {} sweeps over {} levels", sweeps.len(), levels.len());
    sweeps
}

/// Weighted 0..=100 score from penetration depth, reclaim strength and
/// follow-through over the next `lookahead_bars` candles.
pub fn score_sweep(frame: &CandleFrame, sweep: &LiquiditySweep, config: &SweepConfig) -> f64 {
    let price = sweep.level.price;

    let normalizer = match frame.atr_at(sweep.position) {
        Some(atr) if atr > 0.0 => 0.5 * atr,
        _ => config.fallback_volatility,
    };

    let penetration = match sweep.side {
        SweepSide::SellSide => price - sweep.low,
        SweepSide::BuySide => sweep.high - price,
    }
    .max(0.0);
    let depth_score = (penetration / normalizer * 100.0).min(100.0);

    let range = sweep.high - sweep.low;
    let reclaim_score = if range > 0.0 {
        ((sweep.close - price).abs() / range * 100.0).min(100.0)
    } else {
        0.0
    };

    let after_end = (sweep.position + config.lookahead_bars).min(frame.len().saturating_sub(1));
    let displacement_score = if config.lookahead_bars == 0 || after_end <= sweep.position {
        0.0
    } else {
        let later_close = frame.candles[after_end].close;
        let disp = match sweep.side {
            SweepSide::SellSide => later_close - sweep.close,
            SweepSide::BuySide => sweep.close - later_close,
        };
        (disp / normalizer * 100.0).clamp(0.0, 100.0)
    };

    let total = DEPTH_WEIGHT * depth_score + RECLAIM_WEIGHT * reclaim_score + DISPLACEMENT_WEIGHT * displacement_score;
    ((total * 100.0).round() / 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_action::structure::{labeled_swings, SwingPoint};
    use crate::test_support::{candle, featured_random_walk, ts};
    use crate::types::IndicatorColumn;

    fn low_swing(price: f64, position: usize) -> LabeledSwingPoint {
        LabeledSwingPoint {
            swing: SwingPoint {
                timestamp: ts(position as i64),
                price,
                kind: SwingKind::Low,
                position,
                strength: 2,
            },
            label: None,
        }
    }

    fn level(price: f64, kind: LiquidityKind) -> Arc<LiquidityLevel> {
        Arc::new(LiquidityLevel {
            timestamp: ts(0),
            price,
            kind,
            touches: 2,
            swing_positions: vec![],
        })
    }

    #[test]
    fn test_eight_equal_lows_collapse_to_one_level() {
        let prices = [1.1000, 1.1001, 1.1002, 1.0999, 1.1000, 1.1002, 1.1001, 1.0998];
        let swings: Vec<_> = prices.iter().enumerate().map(|(i, p)| low_swing(*p, i * 5)).collect();

        let levels = detect_equal_highs_lows(&swings, &LiquidityConfig::default());
        assert_eq!(levels.len(), 1);
        let lvl = &levels[0];
        assert_eq!(lvl.kind, LiquidityKind::EqualLow);
        assert_eq!(lvl.touches, 8);
        let mean = prices.iter().sum::<f64>() / 8.0;
        assert!((lvl.price - mean).abs() < 1e-12);
    }

    #[test]
    fn test_cluster_anchor_is_first_member() {
        // 1.0, 1.0004, 1.0008: the last is within tolerance of the second but
        // not of the anchor, so it starts its own cluster
        let swings = vec![low_swing(1.0, 1), low_swing(1.0004, 2), low_swing(1.0008, 3)];
        let levels = detect_equal_highs_lows(&swings, &LiquidityConfig::default());
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].touches, 2);
        assert_eq!(levels[0].swing_positions, vec![1, 2]);
    }

    #[test]
    fn test_singletons_dropped() {
        let swings = vec![low_swing(1.0, 1), low_swing(1.01, 2)];
        assert!(detect_equal_highs_lows(&swings, &LiquidityConfig::default()).is_empty());
    }

    #[test]
    fn test_cluster_invariants_on_random_walk() {
        let frame = featured_random_walk(21, 1500);
        let swings = labeled_swings(&frame, &Default::default());
        let config = LiquidityConfig {
            tolerance_abs: 0.05,
            min_touches: 2,
        };
        let levels = detect_equal_highs_lows(&swings, &config);

        for lvl in &levels {
            assert!(lvl.touches >= config.min_touches);
            assert_eq!(lvl.touches, lvl.swing_positions.len());
            let kind = match lvl.kind {
                LiquidityKind::EqualHigh => SwingKind::High,
                _ => SwingKind::Low,
            };
            let members: Vec<f64> = lvl
                .swing_positions
                .iter()
                .map(|p| {
                    swings
                        .iter()
                        .find(|s| s.position() == *p && s.kind() == kind)
                        .unwrap()
                        .price()
                })
                .collect();
            let anchor = members.iter().cloned().fold(f64::INFINITY, f64::min);
            assert!(members.iter().all(|p| (p - anchor).abs() <= config.tolerance_abs + 1e-12));
        }
    }

    #[test]
    fn test_asia_range_uses_latest_date_only() {
        let mut candles = vec![
            candle(0, 1.0, 5.0, 0.5, 1.0),
            candle(1, 1.0, 1.4, 0.9, 1.2),
            candle(2, 1.2, 1.6, 1.1, 1.3),
            candle(3, 1.3, 1.5, 0.8, 1.4),
            candle(4, 1.4, 2.0, 1.3, 1.5),
        ];
        // Previous day, ignored
        candles[0].timestamp = ts(0) - chrono::Duration::days(1);
        let mut frame = CandleFrame::new(candles);
        frame.sessions = Some(vec![
            Session::Asia,
            Session::Asia,
            Session::Asia,
            Session::Asia,
            Session::London,
        ]);

        let levels = detect_asia_range_liquidity(&frame);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].kind, LiquidityKind::AsiaHigh);
        assert_eq!(levels[0].price, 1.6);
        assert_eq!(levels[0].timestamp, ts(2));
        assert_eq!(levels[1].kind, LiquidityKind::AsiaLow);
        assert_eq!(levels[1].price, 0.8);
        assert_eq!(levels[1].touches, 1);
        assert!(levels[1].swing_positions.is_empty());
    }

    #[test]
    fn test_asia_range_needs_labels() {
        let frame = CandleFrame::new(vec![candle(0, 1.0, 1.1, 0.9, 1.0)]);
        assert!(detect_asia_range_liquidity(&frame).is_empty());
    }

    #[test]
    fn test_sell_side_sweep_scored() {
        let candles = vec![
            candle(0, 1.1010, 1.1015, 1.1005, 1.1010),
            candle(1, 1.1010, 1.1012, 1.0990, 1.1008), // wicks under 1.1000, closes above
            candle(2, 1.1008, 1.1015, 1.1006, 1.1012),
            candle(3, 1.1012, 1.1020, 1.1010, 1.1018),
            candle(4, 1.1018, 1.1025, 1.1015, 1.1020),
        ];
        let frame = CandleFrame::new(candles);
        let lvl = level(1.1000, LiquidityKind::EqualLow);
        let sweeps = detect_sweeps(&frame, &[Arc::clone(&lvl)], &SweepConfig::default());

        assert_eq!(sweeps.len(), 1);
        let s = &sweeps[0];
        assert_eq!(s.side, SweepSide::SellSide);
        assert_eq!(s.position, 1);
        assert!(s.reclaimed);
        assert!(Arc::ptr_eq(&s.level, &lvl));

        // depth 0.0010/0.0005 -> capped 100, reclaim 0.0008/0.0022, displacement capped 100
        let reclaim: f64 = 0.0008 / 0.0022 * 100.0;
        let expected = 0.35 * 100.0 + 0.35 * reclaim + 0.30 * 100.0;
        let score = s.score.unwrap();
        assert!((score - (expected * 100.0).round() / 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_buy_side_unscored_by_default() {
        let candles = vec![
            candle(0, 1.0990, 1.0995, 1.0985, 1.0990),
            candle(1, 1.0990, 1.1010, 1.0988, 1.0992),
            candle(2, 1.0992, 1.0994, 1.0980, 1.0982),
        ];
        let frame = CandleFrame::new(candles);
        let levels = [level(1.1000, LiquidityKind::EqualHigh)];

        let sweeps = detect_sweeps(&frame, &levels, &SweepConfig::default());
        assert_eq!(sweeps.len(), 1);
        assert_eq!(sweeps[0].side, SweepSide::BuySide);
        assert_eq!(sweeps[0].score, None);

        let config = SweepConfig {
            score_buy_side: true,
            ..Default::default()
        };
        let sweeps = detect_sweeps(&frame, &levels, &config);
        let score = sweeps[0].score.unwrap();
        assert!(score > 0.0 && score <= 100.0);
    }

    #[test]
    fn test_atr_normalizes_depth() {
        let candles = vec![
            candle(0, 10.0, 10.5, 9.5, 10.0),
            candle(1, 10.0, 10.2, 9.0, 10.1), // wicks 0.5 under 9.5
        ];
        let mut frame = CandleFrame::new(candles);
        frame.atr = Some(IndicatorColumn::new("atr_14", vec![Some(2.0), Some(2.0)]));
        let lvl = level(9.5, LiquidityKind::EqualLow);
        let config = SweepConfig::default();
        let sweeps = detect_sweeps(&frame, &[lvl], &config);
        assert_eq!(sweeps.len(), 1);

        // depth 0.5 / (0.5 * 2.0) = 50, reclaim 0.6 / 1.2 = 50, no candles after
        assert_eq!(sweeps[0].score, Some(35.0));
    }

    #[test]
    fn test_sweep_sides_on_random_walk() {
        let frame = featured_random_walk(5, 1200);
        let swings = labeled_swings(&frame, &Default::default());
        let levels: Vec<Arc<LiquidityLevel>> = detect_equal_highs_lows(
            &swings,
            &LiquidityConfig {
                tolerance_abs: 0.1,
                min_touches: 2,
            },
        )
        .into_iter()
        .map(Arc::new)
        .collect();

        let config = SweepConfig {
            score_buy_side: true,
            ..Default::default()
        };
        let sweeps = detect_sweeps(&frame, &levels, &config);
        for s in &sweeps {
            let p = s.level.price;
            match s.side {
                SweepSide::BuySide => assert!(s.high > p && s.close < p),
                SweepSide::SellSide => assert!(s.low < p && s.close > p),
            }
            assert!(s.position >= frame.len() - config.lookback_bars);
            let score = s.score.unwrap();
            assert!((0.0..=100.0).contains(&score));
        }
    }
}
