//! FX session labels by UTC hour (no DST).

use chrono::{DateTime, Timelike, Utc};

use crate::types::{Candle, Session};

/// Hour at which a new FX day starts (Sydney open)
pub const FX_DAILY_OPEN_UTC: u32 = 22;

struct SessionWindow {
    session: Session,
    open_utc: u32,
    close_utc: u32,
}

// Ordered by match priority, highest first
const FX_SESSIONS: [SessionWindow; 4] = [
    SessionWindow {
        session: Session::NyOverlap,
        open_utc: 13,
        close_utc: 16,
    },
    SessionWindow {
        session: Session::NewYork,
        open_utc: 16,
        close_utc: 22,
    },
    SessionWindow {
        session: Session::London,
        open_utc: 8,
        close_utc: 13,
    },
    SessionWindow {
        session: Session::Asia,
        open_utc: 22,
        close_utc: 8,
    },
];

/// `[open, close)` on a 24h clock, wrapping past midnight when open > close.
fn hour_in_range(hour: u32, open: u32, close: u32) -> bool {
    if open <= close {
        (open..close).contains(&hour)
    } else {
        hour >= open || hour < close
    }
}

pub fn session_for_hour(hour: u32) -> Session {
    FX_SESSIONS
        .iter()
        .find(|w| hour_in_range(hour, w.open_utc, w.close_utc))
        .map_or(Session::Other, |w| w.session)
}

pub fn session_at(ts: DateTime<Utc>) -> Session {
    session_for_hour(ts.hour())
}

pub fn label_sessions(candles: &[Candle]) -> Vec<Session> {
    candles.iter().map(|c| session_at(c.timestamp)).collect()
}
