// Library crate - price-action detection engines and their supporting types

pub mod config;
pub mod error;
pub mod features;
pub mod loader;
pub mod price_action;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::PaError;
pub use price_action::{
    build_context_from_base, build_multi_timeframe_context, build_strategy_view, MultiTimeframeContext,
    StrategyView, TimeframeContext,
};
pub use types::*;
