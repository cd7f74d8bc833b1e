//! Feature engineering consumed by the price-action engines: indicator
//! columns, session labels, reference levels and resampling.

pub mod indicators;
pub mod levels;
pub mod resample;
pub mod sessions;

pub use indicators::{add_core_features, atr, ema, true_range, FeatureConfig};
pub use levels::{
    compute_daily_levels, compute_session_levels, CurrentDayLevels, DailyLevels, PrevDayLevels,
    SessionLevels, SessionRange,
};
pub use resample::resample;
pub use sessions::{label_sessions, session_at, session_for_hour, FX_DAILY_OPEN_UTC};
