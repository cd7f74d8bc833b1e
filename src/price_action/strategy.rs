//! Strategy view: one bias plus the nearest relevant structures, reduced
//! from a base/higher timeframe pair of a multi-timeframe context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::context::{MultiTimeframeContext, TimeframeContext};
use super::fvg::{FairValueGap, FvgDirection};
use super::liquidity::{LiquidityKind, LiquidityLevel, LiquiditySweep, SweepSide};
use super::order_blocks::{OrderBlock, OrderBlockKind};
use super::trend::TrendKind;
use crate::error::PaError;
use crate::features::{DailyLevels, SessionLevels};
use crate::types::{Session, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bias {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "NEUTRAL")]
    Neutral,
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bias::Buy => write!(f, "BUY"),
            Bias::Sell => write!(f, "SELL"),
            Bias::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Sweeps scoring below this are dropped
    pub min_sweep_score: f64,
    pub max_sweeps: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_sweep_score: 40.0,
            max_sweeps: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AsiaRange {
    pub high: Option<f64>,
    pub low: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyView {
    pub instrument: String,
    pub base_timeframe: Timeframe,
    pub higher_timeframe: Timeframe,
    pub as_of: DateTime<Utc>,

    pub price: f64,
    pub session: Option<Session>,

    pub higher_trend: TrendKind,
    pub base_trend: TrendKind,
    pub bias: Bias,

    pub daily_levels: DailyLevels,
    pub session_levels: SessionLevels,

    pub active_order_block: Option<OrderBlock>,
    pub active_fvg: Option<FairValueGap>,
    pub asia_range: Option<AsiaRange>,

    pub liquidity_levels: Vec<Arc<LiquidityLevel>>,
    /// Best score first
    pub liquidity_sweeps: Vec<LiquiditySweep>,
}

/// Both trends agreeing and directional wins; otherwise the base trend
/// decides when it is directional.
pub fn infer_bias(higher: TrendKind, base: TrendKind) -> Bias {
    let from = |kind: TrendKind| match kind {
        TrendKind::Up => Some(Bias::Buy),
        TrendKind::Down => Some(Bias::Sell),
        _ => None,
    };
    if higher == base {
        if let Some(bias) = from(higher) {
            return bias;
        }
    }
    from(base).unwrap_or(Bias::Neutral)
}

fn nearest_by<'a, T>(items: &[&'a T], key: impl Fn(&T) -> f64) -> Option<&'a T> {
    items
        .iter()
        .copied()
        .min_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal))
}

/// Nearest block by zone midpoint, preferring blocks on the bias side.
pub fn pick_active_order_block(blocks: &[OrderBlock], price: f64, bias: Bias) -> Option<&OrderBlock> {
    let wanted = match bias {
        Bias::Buy => Some(OrderBlockKind::Demand),
        Bias::Sell => Some(OrderBlockKind::Supply),
        Bias::Neutral => None,
    };
    let mut candidates: Vec<&OrderBlock> = blocks
        .iter()
        .filter(|ob| wanted.map_or(true, |k| ob.kind == k))
        .collect();
    if candidates.is_empty() {
        candidates = blocks.iter().collect();
    }
    nearest_by(&candidates, |ob| (ob.midpoint() - price).abs())
}

/// Nearest gap by midpoint among those below price for BUY / above for SELL,
/// falling back to all gaps. Filled gaps are eligible.
pub fn pick_active_fvg(gaps: &[FairValueGap], price: f64, bias: Bias) -> Option<&FairValueGap> {
    let mut candidates: Vec<&FairValueGap> = gaps
        .iter()
        .filter(|g| match bias {
            Bias::Buy => g.midpoint() <= price,
            Bias::Sell => g.midpoint() >= price,
            Bias::Neutral => true,
        })
        .collect();
    if candidates.is_empty() {
        candidates = gaps.iter().collect();
    }
    nearest_by(&candidates, |g| (g.midpoint() - price).abs())
}

fn asia_range(levels: &[Arc<LiquidityLevel>]) -> Option<AsiaRange> {
    let mut range = AsiaRange { high: None, low: None };
    for level in levels {
        match level.kind {
            LiquidityKind::AsiaHigh => range.high = Some(level.price),
            LiquidityKind::AsiaLow => range.low = Some(level.price),
            _ => {}
        }
    }
    (range.high.is_some() || range.low.is_some()).then_some(range)
}

/// Scored sweeps at or above `min_score`, best first, at most `max_items`.
pub fn top_sweeps(sweeps: &[LiquiditySweep], min_score: f64, max_items: usize) -> Vec<LiquiditySweep> {
    let mut kept: Vec<LiquiditySweep> = sweeps
        .iter()
        .filter(|s| s.score.is_some_and(|v| v >= min_score))
        .cloned()
        .collect();
    kept.sort_by(|a, b| {
        b.score
            .unwrap_or(0.0)
            .partial_cmp(&a.score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    kept.truncate(max_items);
    kept
}

fn pick_timeframe(ctx: &MultiTimeframeContext, timeframe: Timeframe) -> Result<&TimeframeContext, PaError> {
    ctx.get(timeframe).ok_or_else(|| PaError::TimeframeNotInContext {
        requested: timeframe,
        available: ctx.contexts.keys().copied().collect(),
    })
}

/// Reduce a multi-timeframe context to a strategy view. Both timeframes must
/// be present and the base one must hold candles.
pub fn build_strategy_view(
    ctx: &MultiTimeframeContext,
    base: Timeframe,
    higher: Timeframe,
    config: &StrategyConfig,
) -> Result<StrategyView, PaError> {
    let base_ctx = pick_timeframe(ctx, base)?;
    let higher_ctx = pick_timeframe(ctx, higher)?;

    let frame = &base_ctx.frame;
    let last = frame.last().ok_or(PaError::EmptyTimeframe(base))?;
    let price = last.close;
    let session = frame.session_at(frame.len() - 1);

    let base_trend = base_ctx.trend.kind;
    let higher_trend = higher_ctx.trend.kind;
    let bias = infer_bias(higher_trend, base_trend);

    let active_order_block = pick_active_order_block(&base_ctx.order_blocks, price, bias).cloned();
    let active_fvg = pick_active_fvg(&base_ctx.fvgs, price, bias).cloned();

    let liquidity_sweeps = top_sweeps(&base_ctx.liquidity_sweeps, config.min_sweep_score, config.max_sweeps);

    debug!(
        "{} {}/{}: bias {} (higher {}, base {}), {} sweeps kept",
        ctx.instrument,
        base,
        higher,
        bias,
        higher_trend,
        base_trend,
        liquidity_sweeps.len()
    );

    Ok(StrategyView {
        instrument: ctx.instrument.clone(),
        base_timeframe: base,
        higher_timeframe: higher,
        as_of: last.timestamp,
        price,
        session,
        higher_trend,
        base_trend,
        bias,
        daily_levels: ctx.daily_levels.clone(),
        session_levels: ctx.session_levels.clone(),
        active_order_block,
        active_fvg,
        asia_range: asia_range(&base_ctx.liquidity_levels),
        liquidity_levels: base_ctx.liquidity_levels.clone(),
        liquidity_sweeps,
    })
}

// ============================================================================
// Flattened summary (no candle history)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveOrderBlockSummary {
    pub timestamp: DateTime<Utc>,
    pub kind: OrderBlockKind,
    pub low: f64,
    pub high: f64,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveFvgSummary {
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub direction: FvgDirection,
    pub gap_low: f64,
    pub gap_high: f64,
    pub size_abs: f64,
    pub size_atr: Option<f64>,
    pub is_filled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSummary {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub kind: LiquidityKind,
    pub touches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    pub timestamp: DateTime<Utc>,
    pub level_kind: LiquidityKind,
    pub level_price: f64,
    pub side: SweepSide,
    pub score: Option<f64>,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySummary {
    pub instrument: String,
    pub base_timeframe: Timeframe,
    pub higher_timeframe: Timeframe,
    pub as_of: DateTime<Utc>,
    pub price: f64,
    pub session: Option<Session>,
    pub higher_trend: TrendKind,
    pub base_trend: TrendKind,
    pub bias: Bias,
    pub daily_levels: DailyLevels,
    pub session_levels: SessionLevels,
    pub active_order_block: Option<ActiveOrderBlockSummary>,
    pub active_fvg: Option<ActiveFvgSummary>,
    pub asia_range: Option<AsiaRange>,
    pub liquidity_levels: Vec<LevelSummary>,
    pub liquidity_sweeps: Vec<SweepSummary>,
}

impl StrategyView {
    pub fn summary(&self) -> StrategySummary {
        StrategySummary {
            instrument: self.instrument.clone(),
            base_timeframe: self.base_timeframe,
            higher_timeframe: self.higher_timeframe,
            as_of: self.as_of,
            price: self.price,
            session: self.session,
            higher_trend: self.higher_trend,
            base_trend: self.base_trend,
            bias: self.bias,
            daily_levels: self.daily_levels.clone(),
            session_levels: self.session_levels.clone(),
            active_order_block: self.active_order_block.as_ref().map(|ob| ActiveOrderBlockSummary {
                timestamp: ob.timestamp,
                kind: ob.kind,
                low: ob.low,
                high: ob.high,
                score: ob.score.as_ref().map(|s| s.value),
            }),
            active_fvg: self.active_fvg.as_ref().map(|g| ActiveFvgSummary {
                start_timestamp: g.start_timestamp,
                end_timestamp: g.end_timestamp,
                direction: g.direction,
                gap_low: g.gap_low,
                gap_high: g.gap_high,
                size_abs: g.size_abs,
                size_atr: g.size_atr,
                is_filled: g.is_filled(),
            }),
            asia_range: self.asia_range,
            liquidity_levels: self
                .liquidity_levels
                .iter()
                .map(|l| LevelSummary {
                    timestamp: l.timestamp,
                    price: l.price,
                    kind: l.kind,
                    touches: l.touches,
                })
                .collect(),
            liquidity_sweeps: self
                .liquidity_sweeps
                .iter()
                .map(|s| SweepSummary {
                    timestamp: s.timestamp,
                    level_kind: s.level.kind,
                    level_price: s.level.price,
                    side: s.side,
                    score: s.score,
                    high: s.high,
                    low: s.low,
                    close: s.close,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::price_action::context::build_context_from_base;
    use crate::test_support::{random_walk, ts};

    fn block(kind: OrderBlockKind, low: f64, high: f64) -> OrderBlock {
        OrderBlock {
            timeframe: None,
            kind,
            timestamp: ts(0),
            position: 0,
            low,
            high,
            body_low: low,
            body_high: high,
            bos_timestamp: ts(1),
            bos_position: 1,
            broken_level: high,
            is_mitigated: false,
            score: None,
        }
    }

    fn gap(low: f64, high: f64) -> FairValueGap {
        FairValueGap {
            timeframe: None,
            direction: FvgDirection::Bullish,
            start_position: 0,
            mid_position: 1,
            end_position: 2,
            start_timestamp: ts(0),
            mid_timestamp: ts(1),
            end_timestamp: ts(2),
            gap_low: low,
            gap_high: high,
            size_abs: high - low,
            size_atr: None,
            filled_at: None,
        }
    }

    fn sweep(score: Option<f64>) -> LiquiditySweep {
        LiquiditySweep {
            position: 0,
            timestamp: ts(0),
            level: Arc::new(LiquidityLevel {
                timestamp: ts(0),
                price: 1.0,
                kind: LiquidityKind::EqualLow,
                touches: 2,
                swing_positions: vec![],
            }),
            side: SweepSide::SellSide,
            reclaimed: true,
            high: 1.2,
            low: 0.9,
            close: 1.1,
            score,
        }
    }

    #[test]
    fn test_bias_rules() {
        use TrendKind::*;
        assert_eq!(infer_bias(Up, Up), Bias::Buy);
        assert_eq!(infer_bias(Down, Down), Bias::Sell);
        assert_eq!(infer_bias(Down, Up), Bias::Buy);
        assert_eq!(infer_bias(Range, Down), Bias::Sell);
        assert_eq!(infer_bias(Up, Range), Bias::Neutral);
        assert_eq!(infer_bias(Unclear, Unclear), Bias::Neutral);
    }

    #[test]
    fn test_active_order_block_prefers_bias_side() {
        let blocks = vec![
            block(OrderBlockKind::Supply, 100.0, 101.0),
            block(OrderBlockKind::Demand, 90.0, 91.0),
            block(OrderBlockKind::Demand, 95.0, 96.0),
        ];
        let ob = pick_active_order_block(&blocks, 100.2, Bias::Buy).unwrap();
        assert_eq!((ob.kind, ob.low), (OrderBlockKind::Demand, 95.0));

        let ob = pick_active_order_block(&blocks, 100.2, Bias::Neutral).unwrap();
        assert_eq!(ob.kind, OrderBlockKind::Supply);

        // No supply on the list: nearest overall
        let ob = pick_active_order_block(&blocks[1..], 100.2, Bias::Sell).unwrap();
        assert_eq!(ob.low, 95.0);

        assert!(pick_active_order_block(&[], 1.0, Bias::Buy).is_none());
    }

    #[test]
    fn test_active_fvg_side_of_price() {
        let gaps = vec![gap(99.0, 99.5), gap(100.5, 101.0), gap(97.0, 98.0)];
        assert_eq!(pick_active_fvg(&gaps, 100.0, Bias::Buy).unwrap().gap_low, 99.0);
        assert_eq!(pick_active_fvg(&gaps, 100.0, Bias::Sell).unwrap().gap_low, 100.5);
        // Nothing above 105: fall back to nearest overall
        assert_eq!(pick_active_fvg(&gaps, 105.0, Bias::Sell).unwrap().gap_low, 100.5);
    }

    #[test]
    fn test_top_sweeps_filters_and_ranks() {
        let sweeps = vec![
            sweep(Some(45.0)),
            sweep(None),
            sweep(Some(39.99)),
            sweep(Some(90.0)),
            sweep(Some(60.0)),
        ];
        let kept = top_sweeps(&sweeps, 40.0, 2);
        let scores: Vec<_> = kept.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![Some(90.0), Some(60.0)]);

        assert_eq!(top_sweeps(&sweeps, 40.0, 5).len(), 3);
    }

    #[test]
    fn test_missing_timeframe_fails_fast() {
        let candles = random_walk(8, 600, 1.1);
        let ctx = build_context_from_base("EURUSD", candles, &[Timeframe::M1, Timeframe::M5], &EngineConfig::default());

        let err = build_strategy_view(&ctx, Timeframe::M5, Timeframe::H1, &StrategyConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PaError::TimeframeNotInContext {
                requested: Timeframe::H1,
                available: vec![Timeframe::M1, Timeframe::M5],
            }
        );
    }

    #[test]
    fn test_empty_base_timeframe_errors() {
        let ctx = build_context_from_base("EURUSD", Vec::new(), &[Timeframe::M5, Timeframe::M15], &EngineConfig::default());
        let err = build_strategy_view(&ctx, Timeframe::M5, Timeframe::M15, &StrategyConfig::default()).unwrap_err();
        assert_eq!(err, PaError::EmptyTimeframe(Timeframe::M5));
    }

    #[test]
    fn test_view_from_context() {
        let candles = random_walk(12, 24 * 60, 150.0);
        let last = *candles.last().unwrap();
        let mut config = EngineConfig::default();
        config.liquidity.tolerance_abs = 0.1;
        let ctx = build_context_from_base("USDJPY", candles, &[Timeframe::M1, Timeframe::M5, Timeframe::M15], &config);

        let view = build_strategy_view(&ctx, Timeframe::M1, Timeframe::M15, &config.strategy).unwrap();
        assert_eq!(view.price, last.close);
        assert_eq!(view.as_of, last.timestamp);
        assert!(view.session.is_some());
        assert_eq!(view.bias, infer_bias(view.higher_trend, view.base_trend));
        assert!(view.asia_range.is_some());
        assert!(view.liquidity_sweeps.len() <= config.strategy.max_sweeps);
        assert!(view
            .liquidity_sweeps
            .iter()
            .all(|s| s.score.is_some_and(|v| v >= config.strategy.min_sweep_score)));

        if let (Some(ob), Bias::Buy) = (&view.active_order_block, view.bias) {
            let has_demand = ctx.get(Timeframe::M1).unwrap().order_blocks.iter().any(|o| o.kind == OrderBlockKind::Demand);
            assert!(!has_demand || ob.kind == OrderBlockKind::Demand);
        }

        let json = serde_json::to_value(view.summary()).unwrap();
        assert_eq!(json["instrument"], "USDJPY");
        assert!(json["bias"].is_string());
    }
}
