//! Daily and intraday session reference levels.
//!
//! The FX day runs 22:00 UTC to 21:59:59 UTC the next day and is labelled
//! with its close date.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::sessions::{label_sessions, FX_DAILY_OPEN_UTC};
use crate::types::{Candle, CandleFrame, Session};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrevDayLevels {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentDayLevels {
    pub date: NaiveDate,
    pub open: f64,
    /// Last candle is before the final second of the FX day
    pub incomplete_day: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyLevels {
    pub prev_day: Option<PrevDayLevels>,
    pub current_day: Option<CurrentDayLevels>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionRange {
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionLevels {
    /// Latest UTC calendar date in the series
    pub date: Option<NaiveDate>,
    pub sessions: BTreeMap<Session, SessionRange>,
}

/// Start of the FX day containing `ts`.
pub fn fx_day_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let day = if ts.hour() >= FX_DAILY_OPEN_UTC {
        ts.date_naive()
    } else {
        ts.date_naive() - Duration::days(1)
    };
    day.and_time(NaiveTime::MIN).and_utc() + Duration::hours(FX_DAILY_OPEN_UTC as i64)
}

fn in_window<'a>(candles: &'a [Candle], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&'a Candle> {
    candles
        .iter()
        .filter(|c| c.timestamp >= start && c.timestamp <= end)
        .collect()
}

/// Previous and current FX day levels relative to the last candle.
pub fn compute_daily_levels(candles: &[Candle]) -> DailyLevels {
    let Some(last_ts) = candles.iter().map(|c| c.timestamp).max() else {
        return DailyLevels::default();
    };

    let current_start = fx_day_start(last_ts);
    let prev_start = current_start - Duration::days(1);
    let prev_end = current_start - Duration::seconds(1);
    let current_end = current_start + Duration::days(1) - Duration::seconds(1);

    let prev = in_window(candles, prev_start, prev_end);
    let current = in_window(candles, current_start, current_end);

    let prev_day = match (prev.first(), prev.last()) {
        (Some(first), Some(last)) => Some(PrevDayLevels {
            date: (prev_start + Duration::days(1)).date_naive(),
            open: first.open,
            close: last.close,
            high: prev.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max),
            low: prev.iter().map(|c| c.low).fold(f64::INFINITY, f64::min),
        }),
        _ => None,
    };

    let current_day = current.first().map(|first| CurrentDayLevels {
        date: (current_start + Duration::days(1)).date_naive(),
        open: first.open,
        incomplete_day: current.iter().map(|c| c.timestamp).max().is_some_and(|t| t < current_end),
    });

    DailyLevels { prev_day, current_day }
}

/// High/low of every session present on the latest calendar date. Labels are
/// computed from timestamps when the frame carries none.
pub fn compute_session_levels(frame: &CandleFrame) -> SessionLevels {
    let Some(day) = frame.candles.iter().map(|c| c.timestamp.date_naive()).max() else {
        return SessionLevels::default();
    };

    let computed;
    let sessions = match frame.sessions.as_ref() {
        Some(s) => s,
        None => {
            computed = label_sessions(&frame.candles);
            &computed
        }
    };

    let mut out: BTreeMap<Session, SessionRange> = BTreeMap::new();
    for (c, session) in frame.candles.iter().zip(sessions) {
        if c.timestamp.date_naive() != day || *session == Session::Other {
            continue;
        }
        out.entry(*session)
            .and_modify(|r| {
                r.high = r.high.max(c.high);
                r.low = r.low.min(c.low);
            })
            .or_insert(SessionRange {
                high: c.high,
                low: c.low,
            });
    }

    if out.is_empty() {
        return SessionLevels::default();
    }
    SessionLevels {
        date: Some(day),
        sessions: out,
    }
}
