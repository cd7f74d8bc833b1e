//! Per-candle indicator columns: ATR (SMA of true range) and EMA.

use serde::{Deserialize, Serialize};

use super::sessions::label_sessions;
use crate::types::{Candle, CandleFrame, IndicatorColumn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub atr_period: usize,
    /// EMA span used for trend confirmation
    pub ema_period: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            ema_period: 50,
        }
    }
}

/// True range per candle. The first candle has no previous close and uses
/// its own high - low.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let hl = c.high - c.low;
            match i.checked_sub(1).map(|p| candles[p].close) {
                Some(prev_close) => hl
                    .max((c.high - prev_close).abs())
                    .max((c.low - prev_close).abs()),
                None => hl,
            }
        })
        .collect()
}

/// Simple moving average of true range over `period`. Rows before a full
/// window are `None`.
pub fn atr(candles: &[Candle], period: usize) -> IndicatorColumn {
    let tr = true_range(candles);
    let mut values = vec![None; tr.len()];

    if period > 0 && tr.len() >= period {
        let mut sum: f64 = tr[..period].iter().sum();
        values[period - 1] = Some(sum / period as f64);
        for i in period..tr.len() {
            sum += tr[i] - tr[i - period];
            values[i] = Some(sum / period as f64);
        }
    }

    IndicatorColumn::new(format!("atr_{}", period), values)
}

/// Exponential moving average of closes, alpha = 2 / (span + 1), seeded with
/// the first close. Defined for every row.
pub fn ema(candles: &[Candle], span: usize) -> IndicatorColumn {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut values = Vec::with_capacity(candles.len());
    let mut prev: Option<f64> = None;

    for c in candles {
        let next = match prev {
            Some(p) => alpha * c.close + (1.0 - alpha) * p,
            None => c.close,
        };
        values.push(Some(next));
        prev = Some(next);
    }

    IndicatorColumn::new(format!("ema_{}", span), values)
}

/// Attach ATR, EMA and session labels, replacing any existing columns.
pub fn add_core_features(mut frame: CandleFrame, config: &FeatureConfig) -> CandleFrame {
    if frame.is_empty() {
        return frame;
    }
    frame.atr = Some(atr(&frame.candles, config.atr_period));
    frame.ema = Some(ema(&frame.candles, config.ema_period));
    frame.sessions = Some(label_sessions(&frame.candles));
    frame
}
