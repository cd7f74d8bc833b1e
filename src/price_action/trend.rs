//! Trend inference from swing structure plus a moving-average filter

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use super::structure::{LabeledSwingPoint, SwingKind, SwingLabel};
use crate::types::{CandleFrame, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendKind {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
    #[serde(rename = "RANGE")]
    Range,
    #[serde(rename = "UNCLEAR")]
    Unclear,
}

impl TrendKind {
    pub fn is_directional(&self) -> bool {
        matches!(self, TrendKind::Up | TrendKind::Down)
    }
}

impl fmt::Display for TrendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendKind::Up => write!(f, "UP"),
            TrendKind::Down => write!(f, "DOWN"),
            TrendKind::Range => write!(f, "RANGE"),
            TrendKind::Unclear => write!(f, "UNCLEAR"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Number of most recent swings considered (default: 4)
    pub min_swings: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self { min_swings: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendState {
    pub kind: TrendKind,
    /// Label counts and the close/MA comparison behind the decision
    pub reason: String,
    pub timeframe: Option<Timeframe>,
}

impl TrendState {
    pub fn unclear(reason: impl Into<String>, timeframe: Option<Timeframe>) -> Self {
        Self {
            kind: TrendKind::Unclear,
            reason: reason.into(),
            timeframe,
        }
    }
}

fn format_labels(labels: &[SwingLabel]) -> String {
    let parts: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Classify the trend from the last `min_swings` labeled swings and the last
/// close against the moving-average column.
pub fn infer_trend(
    frame: &CandleFrame,
    swings: &[LabeledSwingPoint],
    min_swings: usize,
    timeframe: Option<Timeframe>,
) -> TrendState {
    let Some(last) = frame.last() else {
        return TrendState::unclear("Not enough data or swings to determine trend.", timeframe);
    };
    if swings.len() < min_swings {
        return TrendState::unclear("Not enough data or swings to determine trend.", timeframe);
    }

    let Some(ema) = frame.ema.as_ref() else {
        warn!("No moving-average column attached, trend left UNCLEAR");
        return TrendState::unclear("Moving-average column not present.", timeframe);
    };

    let last_close = last.close;
    let last_ema = ema.last();
    let ema_name = ema.name.as_str();

    let recent = &swings[swings.len() - min_swings..];

    let high_labels: Vec<SwingLabel> = recent
        .iter()
        .filter(|s| s.kind() == SwingKind::High)
        .filter_map(|s| s.label)
        .collect();
    let low_labels: Vec<SwingLabel> = recent
        .iter()
        .filter(|s| s.kind() == SwingKind::Low)
        .filter_map(|s| s.label)
        .collect();

    let count = |labels: &[SwingLabel], target: SwingLabel| labels.iter().filter(|l| **l == target).count();
    let hh = count(&high_labels, SwingLabel::HH);
    let lh = count(&high_labels, SwingLabel::LH);
    let hl = count(&low_labels, SwingLabel::HL);
    let ll = count(&low_labels, SwingLabel::LL);

    let up_structure = hh >= lh && hl >= ll && hh + hl > 0;
    let down_structure = lh >= hh && ll >= hl && lh + ll > 0;

    // A missing MA value at the last row confirms neither direction
    let close_above = last_ema.is_some_and(|e| last_close > e);
    let close_below = last_ema.is_some_and(|e| last_close < e);
    let ema_text = last_ema.map_or_else(|| "n/a".to_string(), |e| format!("{:.3}", e));

    let highs = format_labels(&high_labels);
    let lows = format_labels(&low_labels);
    let counts = format!("HH={} LH={} HL={} LL={}", hh, lh, hl, ll);

    let (kind, reason) = if up_structure && close_above {
        (
            TrendKind::Up,
            format!(
                "UP: highs={}, lows={} ({}), close({:.3}) > {}({})",
                highs, lows, counts, last_close, ema_name, ema_text
            ),
        )
    } else if down_structure && close_below {
        (
            TrendKind::Down,
            format!(
                "DOWN: highs={}, lows={} ({}), close({:.3}) < {}({})",
                highs, lows, counts, last_close, ema_name, ema_text
            ),
        )
    } else if !high_labels.is_empty() || !low_labels.is_empty() {
        (
            TrendKind::Range,
            format!(
                "RANGE: highs={}, lows={} ({}), close={:.3}, {}={}",
                highs, lows, counts, last_close, ema_name, ema_text
            ),
        )
    } else {
        (
            TrendKind::Unclear,
            "Structure insufficient to determine clear trend.".to_string(),
        )
    };

    debug!("Trend {:?} for {:?}: {}", kind, timeframe, reason);

    TrendState {
        kind,
        reason,
        timeframe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_action::structure::{detect_swings, label_swings};
    use crate::test_support::{candles_from_closes, ema_column};

    fn frame_with_ema(closes: &[f64], span: usize) -> CandleFrame {
        let candles = candles_from_closes(closes);
        let mut frame = CandleFrame::new(candles);
        frame.ema = Some(ema_column(closes, span));
        frame
    }

    #[test]
    fn test_rising_series_is_up() {
        let closes = [100.0, 101.0, 102.0, 101.0, 103.0, 104.0, 103.0, 105.0, 104.0, 106.0, 107.0];
        let frame = frame_with_ema(&closes, 3);
        let swings = label_swings(&detect_swings(&frame.candles, 1, 1));

        let trend = infer_trend(&frame, &swings, 4, Some(Timeframe::M15));
        assert_eq!(trend.kind, TrendKind::Up);
        assert!(trend.reason.contains("HH="));
        assert!(trend.reason.contains("ema_3"));
        assert_eq!(trend.timeframe, Some(Timeframe::M15));
    }

    #[test]
    fn test_falling_series_is_down() {
        let closes = [107.0, 106.0, 105.0, 106.0, 104.0, 103.0, 104.0, 102.0, 103.0, 101.0, 100.0];
        let frame = frame_with_ema(&closes, 3);
        let swings = label_swings(&detect_swings(&frame.candles, 1, 1));

        let trend = infer_trend(&frame, &swings, 4, None);
        assert_eq!(trend.kind, TrendKind::Down);
    }

    #[test]
    fn test_structure_against_ma_is_range() {
        // Up structure but the last close drops under the average
        let closes = [100.0, 101.0, 102.0, 101.0, 103.0, 104.0, 103.0, 105.0, 104.0, 106.0, 90.0];
        let frame = frame_with_ema(&closes, 3);
        let swings = label_swings(&detect_swings(&frame.candles, 1, 1));

        let trend = infer_trend(&frame, &swings, 4, None);
        assert_eq!(trend.kind, TrendKind::Range);
        assert!(trend.reason.starts_with("RANGE"));
    }

    #[test]
    fn test_too_few_swings_is_unclear() {
        let closes = [100.0, 101.0, 102.0, 101.0, 100.0];
        let frame = frame_with_ema(&closes, 3);
        let swings = label_swings(&detect_swings(&frame.candles, 1, 1));
        assert!(swings.len() < 4);

        let trend = infer_trend(&frame, &swings, 4, None);
        assert_eq!(trend.kind, TrendKind::Unclear);
    }

    #[test]
    fn test_missing_ma_column_is_unclear() {
        let closes = [100.0, 101.0, 102.0, 101.0, 103.0, 104.0, 103.0, 105.0, 104.0, 106.0, 107.0];
        let frame = CandleFrame::new(candles_from_closes(&closes));
        let swings = label_swings(&detect_swings(&frame.candles, 1, 1));

        let trend = infer_trend(&frame, &swings, 4, None);
        assert_eq!(trend.kind, TrendKind::Unclear);
        assert!(trend.reason.contains("Moving-average"));
    }

    #[test]
    fn test_empty_frame_is_unclear() {
        let trend = infer_trend(&CandleFrame::default(), &[], 4, Some(Timeframe::H1));
        assert_eq!(trend.kind, TrendKind::Unclear);
        assert_eq!(trend.timeframe, Some(Timeframe::H1));
    }
}
