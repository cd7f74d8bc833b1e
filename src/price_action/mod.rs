//! Price-action engines
//!
//! - Swing detection and HH/HL/LH/LL labeling
//! - Trend inference from swing structure and a moving average
//! - Order blocks from breaks of structure, with scoring
//! - Fair value gaps with fill tracking
//! - Equal high/low and Asia-range liquidity, sweeps
//! - Per-timeframe and multi-timeframe aggregation
//! - Strategy view selection

pub mod context;
pub mod fvg;
pub mod liquidity;
pub mod order_blocks;
pub mod strategy;
pub mod structure;
pub mod trend;

// Re-export commonly used types
pub use context::{
    build_context_from_base, build_multi_timeframe_context, build_timeframe_context, ContextSummary,
    MultiTimeframeContext, SummaryConfig, TimeframeContext,
};
pub use fvg::{detect_fvgs, mark_fills, FairValueGap, FvgConfig, FvgDirection};
pub use liquidity::{
    detect_asia_range_liquidity, detect_equal_highs_lows, detect_sweeps, score_sweep, LiquidityConfig,
    LiquidityKind, LiquidityLevel, LiquiditySweep, SweepConfig, SweepSide,
};
pub use order_blocks::{
    detect_order_blocks, mark_mitigation, score_order_blocks, OrderBlock, OrderBlockConfig, OrderBlockKind,
    OrderBlockScore, ScoreComponents,
};
pub use strategy::{build_strategy_view, infer_bias, AsiaRange, Bias, StrategyConfig, StrategySummary, StrategyView};
pub use structure::{detect_swings, label_swings, labeled_swings, LabeledSwingPoint, SwingConfig, SwingKind, SwingLabel, SwingPoint};
pub use trend::{infer_trend, TrendConfig, TrendKind, TrendState};
