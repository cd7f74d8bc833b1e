//! Per-timeframe and multi-timeframe price-action context
//!
//! `build_timeframe_context` runs every engine over one candle frame in a
//! fixed order: swings -> trend -> order blocks -> FVGs -> liquidity -> sweeps.
//! `build_multi_timeframe_context` fans that out over a set of already
//! featured frames and attaches the daily/session reference levels of the
//! finest one.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::fvg::{detect_fvgs, mark_fills, FairValueGap, FvgDirection};
use super::liquidity::{
    detect_asia_range_liquidity, detect_equal_highs_lows, detect_sweeps, LiquidityLevel, LiquiditySweep,
};
use super::order_blocks::{detect_order_blocks, mark_mitigation, score_order_blocks, OrderBlock, OrderBlockKind};
use super::structure::{labeled_swings, LabeledSwingPoint, SwingKind, SwingLabel};
use super::trend::{infer_trend, TrendKind, TrendState};
use crate::config::EngineConfig;
use crate::features::{
    add_core_features, compute_daily_levels, compute_session_levels, resample, DailyLevels, SessionLevels,
};
use crate::types::{Candle, CandleFrame, Timeframe};

/// Everything detected on one timeframe
#[derive(Debug, Clone, Serialize)]
pub struct TimeframeContext {
    pub timeframe: Timeframe,
    pub frame: CandleFrame,
    pub swings: Vec<LabeledSwingPoint>,
    pub trend: TrendState,
    /// Sorted by score, highest first
    pub order_blocks: Vec<OrderBlock>,
    pub fvgs: Vec<FairValueGap>,
    pub liquidity_levels: Vec<Arc<LiquidityLevel>>,
    pub liquidity_sweeps: Vec<LiquiditySweep>,
}

impl TimeframeContext {
    fn empty(timeframe: Timeframe, frame: CandleFrame) -> Self {
        Self {
            timeframe,
            frame,
            swings: Vec::new(),
            trend: TrendState::unclear("Empty candle series.", Some(timeframe)),
            order_blocks: Vec::new(),
            fvgs: Vec::new(),
            liquidity_levels: Vec::new(),
            liquidity_sweeps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiTimeframeContext {
    pub instrument: String,
    /// Timestamp of the last base candle
    pub as_of: Option<DateTime<Utc>>,
    /// Finest timeframe present
    pub base_timeframe: Option<Timeframe>,
    pub timeframes: Vec<Timeframe>,
    pub contexts: BTreeMap<Timeframe, TimeframeContext>,
    pub daily_levels: DailyLevels,
    pub session_levels: SessionLevels,
}

impl MultiTimeframeContext {
    pub fn get(&self, timeframe: Timeframe) -> Option<&TimeframeContext> {
        self.contexts.get(&timeframe)
    }

    pub fn summary(&self, config: &SummaryConfig) -> ContextSummary {
        let timeframe_details = self
            .contexts
            .iter()
            .map(|(tf, ctx)| (*tf, TimeframeSummary::from_context(ctx, config)))
            .collect();

        ContextSummary {
            instrument: self.instrument.clone(),
            as_of: self.as_of,
            base_timeframe: self.base_timeframe,
            timeframes: self.timeframes.clone(),
            daily_levels: self.daily_levels.clone(),
            session_levels: self.session_levels.clone(),
            timeframe_details,
        }
    }
}

/// Run every engine over one frame. Session-range liquidity is only added
/// when `include_session_liquidity` is set (the base timeframe).
pub fn build_timeframe_context(
    timeframe: Timeframe,
    frame: CandleFrame,
    include_session_liquidity: bool,
    config: &EngineConfig,
) -> TimeframeContext {
    if frame.is_empty() {
        debug!("{}: empty frame, skipping engines", timeframe);
        return TimeframeContext::empty(timeframe, frame);
    }
    let tf = Some(timeframe);

    let swings = labeled_swings(&frame, &config.swings);
    let trend = infer_trend(&frame, &swings, config.trend.min_swings, tf);

    let mut raw_blocks = detect_order_blocks(&frame, &swings, tf, config.order_blocks.max_lookback_bars);
    if config.order_blocks.track_mitigation {
        raw_blocks = mark_mitigation(&frame, raw_blocks);
    }
    let order_blocks = score_order_blocks(&frame, &raw_blocks, Some(&trend), &config.order_blocks);

    let fvgs = mark_fills(&frame, detect_fvgs(&frame, tf, &config.fvg));

    let mut levels = detect_equal_highs_lows(&swings, &config.liquidity);
    if include_session_liquidity {
        levels.extend(detect_asia_range_liquidity(&frame));
    }
    let liquidity_levels: Vec<Arc<LiquidityLevel>> = levels.into_iter().map(Arc::new).collect();
    let liquidity_sweeps = detect_sweeps(&frame, &liquidity_levels, &config.sweeps);

    info!(
        "{}: {} candles, {} swings, trend {}, {} OBs, {} FVGs, {} levels, {} sweeps",
        timeframe,
        frame.len(),
        swings.len(),
        trend.kind,
        order_blocks.len(),
        fvgs.len(),
        liquidity_levels.len(),
        liquidity_sweeps.len()
    );

    TimeframeContext {
        timeframe,
        frame,
        swings,
        trend,
        order_blocks,
        fvgs,
        liquidity_levels,
        liquidity_sweeps,
    }
}

/// Build every timeframe in parallel from already featured frames. The
/// finest key is the base: it supplies the reference levels, the as-of time
/// and the Asia-range liquidity.
pub fn build_multi_timeframe_context(
    instrument: &str,
    frames: BTreeMap<Timeframe, CandleFrame>,
    config: &EngineConfig,
) -> MultiTimeframeContext {
    let base_timeframe = frames.keys().next().copied();
    let base = base_timeframe.and_then(|tf| frames.get(&tf));

    let daily_levels = base.map(|f| compute_daily_levels(&f.candles)).unwrap_or_default();
    let session_levels = base.map(compute_session_levels).unwrap_or_default();
    let as_of = base.and_then(|f| f.last()).map(|c| c.timestamp);
    let timeframes: Vec<Timeframe> = frames.keys().copied().collect();

    let contexts: BTreeMap<Timeframe, TimeframeContext> = frames
        .into_par_iter()
        .map(|(tf, frame)| {
            let is_base = Some(tf) == base_timeframe;
            (tf, build_timeframe_context(tf, frame, is_base, config))
        })
        .collect();

    info!(
        "{}: built context for {:?} (base {:?}, as of {:?})",
        instrument, timeframes, base_timeframe, as_of
    );

    MultiTimeframeContext {
        instrument: instrument.to_string(),
        as_of,
        base_timeframe,
        timeframes,
        contexts,
        daily_levels,
        session_levels,
    }
}

/// Sort and de-duplicate a raw series, then resample and feature it into
/// each requested timeframe. The finest requested timeframe is the base.
pub fn build_context_from_base(
    instrument: &str,
    mut base_candles: Vec<Candle>,
    timeframes: &[Timeframe],
    config: &EngineConfig,
) -> MultiTimeframeContext {
    base_candles.sort_by_key(|c| c.timestamp);
    base_candles.dedup_by_key(|c| c.timestamp);

    let frames: BTreeMap<Timeframe, CandleFrame> = timeframes
        .par_iter()
        .map(|tf| {
            let candles = resample(&base_candles, *tf);
            (*tf, add_core_features(CandleFrame::new(candles), &config.features))
        })
        .collect();

    build_multi_timeframe_context(instrument, frames, config)
}

// ============================================================================
// JSON-safe summary
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Most recent swings kept per timeframe
    pub swing_tail: usize,
    /// Order blocks kept per timeframe, best score first
    pub top_order_blocks: usize,
    /// Most recent FVGs kept per timeframe
    pub recent_fvgs: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            swing_tail: 10,
            top_order_blocks: 5,
            recent_fvgs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingSummary {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub kind: SwingKind,
    pub label: Option<SwingLabel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSummary {
    pub kind: TrendKind,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBlockSummary {
    pub timestamp: DateTime<Utc>,
    pub kind: OrderBlockKind,
    pub low: f64,
    pub high: f64,
    pub body_low: f64,
    pub body_high: f64,
    pub score: Option<f64>,
}

impl From<&OrderBlock> for OrderBlockSummary {
    fn from(ob: &OrderBlock) -> Self {
        Self {
            timestamp: ob.timestamp,
            kind: ob.kind,
            low: ob.low,
            high: ob.high,
            body_low: ob.body_low,
            body_high: ob.body_high,
            score: ob.score.as_ref().map(|s| s.value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FvgSummary {
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub direction: FvgDirection,
    pub gap_low: f64,
    pub gap_high: f64,
    pub is_filled: bool,
}

impl From<&FairValueGap> for FvgSummary {
    fn from(gap: &FairValueGap) -> Self {
        Self {
            start_timestamp: gap.start_timestamp,
            end_timestamp: gap.end_timestamp,
            direction: gap.direction,
            gap_low: gap.gap_low,
            gap_high: gap.gap_high,
            is_filled: gap.is_filled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeSummary {
    pub swings: Vec<SwingSummary>,
    pub trend: TrendSummary,
    pub order_blocks: Vec<OrderBlockSummary>,
    pub fvgs: Vec<FvgSummary>,
}

impl TimeframeSummary {
    fn from_context(ctx: &TimeframeContext, config: &SummaryConfig) -> Self {
        let swing_start = ctx.swings.len().saturating_sub(config.swing_tail);
        let swings = ctx.swings[swing_start..]
            .iter()
            .map(|s| SwingSummary {
                timestamp: s.timestamp(),
                price: s.price(),
                kind: s.kind(),
                label: s.label,
            })
            .collect();

        let mut ranked: Vec<&OrderBlock> = ctx.order_blocks.iter().collect();
        ranked.sort_by(|a, b| {
            b.score_value()
                .partial_cmp(&a.score_value())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let order_blocks = ranked
            .into_iter()
            .take(config.top_order_blocks)
            .map(OrderBlockSummary::from)
            .collect();

        let fvg_start = ctx.fvgs.len().saturating_sub(config.recent_fvgs);
        let fvgs = ctx.fvgs[fvg_start..].iter().map(FvgSummary::from).collect();

        Self {
            swings,
            trend: TrendSummary {
                kind: ctx.trend.kind,
                reason: ctx.trend.reason.clone(),
            },
            order_blocks,
            fvgs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSummary {
    pub instrument: String,
    pub as_of: Option<DateTime<Utc>>,
    pub base_timeframe: Option<Timeframe>,
    pub timeframes: Vec<Timeframe>,
    pub daily_levels: DailyLevels,
    pub session_levels: SessionLevels,
    pub timeframe_details: BTreeMap<Timeframe, TimeframeSummary>,
}
