//! Engine configuration
//!
//! Every section has defaults, so a JSON file only needs the values it
//! overrides:
//!
//! ```json
//! { "swings": { "left": 3, "right": 3 }, "liquidity": { "tolerance_abs": 0.02 } }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PaError;
use crate::features::FeatureConfig;
use crate::price_action::context::SummaryConfig;
use crate::price_action::fvg::FvgConfig;
use crate::price_action::liquidity::{LiquidityConfig, SweepConfig};
use crate::price_action::order_blocks::OrderBlockConfig;
use crate::price_action::strategy::StrategyConfig;
use crate::price_action::structure::SwingConfig;
use crate::price_action::trend::TrendConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub features: FeatureConfig,
    pub swings: SwingConfig,
    pub trend: TrendConfig,
    pub order_blocks: OrderBlockConfig,
    pub fvg: FvgConfig,
    pub liquidity: LiquidityConfig,
    pub sweeps: SweepConfig,
    pub strategy: StrategyConfig,
    pub summary: SummaryConfig,
}

impl EngineConfig {
    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PaError> {
        let invalid = |msg: &str| Err(PaError::InvalidConfig(msg.to_string()));

        if self.swings.left == 0 || self.swings.right == 0 {
            return invalid("swing windows must be non-zero");
        }
        if self.trend.min_swings == 0 {
            return invalid("trend.min_swings must be non-zero");
        }
        if self.features.atr_period == 0 || self.features.ema_period == 0 {
            return invalid("feature periods must be non-zero");
        }
        if self.order_blocks.max_lookback_bars == 0 {
            return invalid("order_blocks.max_lookback_bars must be non-zero");
        }
        if self.order_blocks.freshness_horizon_bars == 0 {
            return invalid("order_blocks.freshness_horizon_bars must be non-zero");
        }
        if self.fvg.min_size_atr.is_nan() || self.fvg.min_size_atr < 0.0 {
            return invalid("fvg.min_size_atr must be >= 0");
        }
        if self.liquidity.tolerance_abs.is_nan() || self.liquidity.tolerance_abs < 0.0 {
            return invalid("liquidity.tolerance_abs must be >= 0");
        }
        if self.liquidity.min_touches == 0 {
            return invalid("liquidity.min_touches must be non-zero");
        }
        if self.sweeps.lookback_bars == 0 {
            return invalid("sweeps.lookback_bars must be non-zero");
        }
        if self.sweeps.fallback_volatility.is_nan() || self.sweeps.fallback_volatility <= 0.0 {
            return invalid("sweeps.fallback_volatility must be > 0");
        }
        if self.strategy.min_sweep_score.is_nan() || self.strategy.min_sweep_score < 0.0 {
            return invalid("strategy.min_sweep_score must be >= 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.swings.left, 2);
        assert_eq!(config.swings.right, 2);
        assert_eq!(config.trend.min_swings, 4);
        assert_eq!(config.order_blocks.max_lookback_bars, 20);
        assert_eq!(config.fvg.min_size_atr, 0.0);
        assert_eq!(config.liquidity.tolerance_abs, 0.0005);
        assert_eq!(config.liquidity.min_touches, 2);
        assert_eq!(config.sweeps.lookback_bars, 200);
        assert_eq!(config.sweeps.lookahead_bars, 3);
        assert_eq!(config.strategy.min_sweep_score, 40.0);
        assert_eq!(config.strategy.max_sweeps, 5);
        assert_eq!(config.features.atr_period, 14);
        assert_eq!(config.features.ema_period, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "swings": { "left": 3 }, "liquidity": { "tolerance_abs": 0.02 } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.swings.left, 3);
        assert_eq!(config.swings.right, 2);
        assert_eq!(config.liquidity.tolerance_abs, 0.02);
        assert_eq!(config.liquidity.min_touches, 2);
        assert_eq!(config.summary.top_order_blocks, 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.swings.right = 0;
        assert!(matches!(config.validate(), Err(PaError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.liquidity.tolerance_abs = -1.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.fvg.min_size_atr = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sweeps.fallback_volatility = 0.0;
        assert!(config.validate().is_err());
        config.sweeps.fallback_volatility = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.strategy.min_sweep_score = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("pa_engine_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "trend": { "min_swings": 6 } }"#).unwrap();
        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.trend.min_swings, 6);
        std::fs::remove_file(&path).unwrap();

        assert!(EngineConfig::from_json_file("/nonexistent/pa_engine.json").is_err());
    }
}
