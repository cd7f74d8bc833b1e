use thiserror::Error;

use crate::types::Timeframe;

/// Caller errors raised by the engine. Degenerate data (empty or short
/// series, missing indicator columns) never produces one of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PaError {
    #[error("timeframe {requested} not in context (available: {available:?})")]
    TimeframeNotInContext {
        requested: Timeframe,
        available: Vec<Timeframe>,
    },

    #[error("no candles in timeframe {0}")]
    EmptyTimeframe(Timeframe),

    #[error("unknown timeframe tag: {0:?}")]
    UnknownTimeframeTag(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
