//! Time window matching.
//!
//! ABSOLUTE_TIME windows compare the local wall-clock minute of the instant
//! against `[startTime, endTime)`. DURATION_BASED windows compare whole
//! minutes elapsed since a booking reference instant against
//! `[startMinute, endMinute)`, and only when duration context is enabled.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use super::models::{SurgeWindow, TimeWindow, WindowType};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Why a window can never match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidWindow {
    pub reason: String,
}

impl InvalidWindow {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Validated window bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBounds {
    /// Minutes of day, end may be 1440
    Absolute { start: u32, end: u32 },
    /// Minutes from the booking reference
    Duration { start: i64, end: i64 },
}

/// Parse `HH:MM` into minutes since midnight. `24:00` is accepted.
pub fn parse_clock(value: &str) -> Option<u32> {
    let (h, m) = value.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if m > 59 {
        return None;
    }
    let total = h * 60 + m;
    (total <= MINUTES_PER_DAY).then_some(total)
}

/// Validate a window's field pairs and ordering
pub fn window_bounds(window: &TimeWindow) -> Result<WindowBounds, InvalidWindow> {
    let has_clock = window.start_time.is_some() || window.end_time.is_some();
    let has_minutes = window.start_minute.is_some() || window.end_minute.is_some();

    match (has_clock, has_minutes) {
        (true, true) => return Err(InvalidWindow::new("both clock and minute bounds populated")),
        (false, false) => return Err(InvalidWindow::new("no bounds populated")),
        _ => {}
    }

    match window.window_type {
        WindowType::AbsoluteTime => {
            let (Some(start), Some(end)) = (&window.start_time, &window.end_time) else {
                return Err(InvalidWindow::new("ABSOLUTE_TIME window needs startTime and endTime"));
            };
            let start_min = parse_clock(start)
                .filter(|m| *m < MINUTES_PER_DAY)
                .ok_or_else(|| InvalidWindow::new(format!("unparseable startTime '{start}'")))?;
            let end_min = parse_clock(end)
                .ok_or_else(|| InvalidWindow::new(format!("unparseable endTime '{end}'")))?;
            if end_min <= start_min {
                return Err(InvalidWindow::new(format!("endTime {end} not after startTime {start}")));
            }
            Ok(WindowBounds::Absolute {
                start: start_min,
                end: end_min,
            })
        }
        WindowType::DurationBased => {
            let (Some(start), Some(end)) = (window.start_minute, window.end_minute) else {
                return Err(InvalidWindow::new("DURATION_BASED window needs startMinute and endMinute"));
            };
            if end <= start {
                return Err(InvalidWindow::new(format!("endMinute {end} not after startMinute {start}")));
            }
            Ok(WindowBounds::Duration { start, end })
        }
    }
}

/// Minute of the local day for an instant
pub fn local_minute_of_day(instant: DateTime<Utc>, tz: Tz) -> u32 {
    let local = instant.with_timezone(&tz);
    local.hour() * 60 + local.minute()
}

/// Whole minutes from `reference` to `instant`, floored
pub fn minutes_since(reference: DateTime<Utc>, instant: DateTime<Utc>) -> i64 {
    (instant - reference).num_seconds().div_euclid(60)
}

/// Evaluate a window at `instant`.
///
/// Returns `Ok(Some(price))` on match, `Ok(None)` when the window does not
/// apply (including DURATION_BASED windows when `reference` is `None`), and
/// `Err` for windows that can never match.
pub fn match_window(
    window: &TimeWindow,
    instant: DateTime<Utc>,
    tz: Tz,
    reference: Option<DateTime<Utc>>,
) -> Result<Option<Decimal>, InvalidWindow> {
    let matched = match window_bounds(window)? {
        WindowBounds::Absolute { start, end } => {
            let minute = local_minute_of_day(instant, tz);
            start <= minute && minute < end
        }
        WindowBounds::Duration { start, end } => match reference {
            Some(reference) => {
                let elapsed = minutes_since(reference, instant);
                start <= elapsed && elapsed < end
            }
            None => false,
        },
    };
    Ok(matched.then_some(window.price_per_hour))
}

/// Evaluate a surge window at `instant`; overnight when start > end
pub fn match_surge_window(
    window: &SurgeWindow,
    instant: DateTime<Utc>,
    tz: Tz,
) -> Result<bool, InvalidWindow> {
    let start = parse_clock(&window.start_time)
        .filter(|m| *m < MINUTES_PER_DAY)
        .ok_or_else(|| InvalidWindow::new(format!("unparseable startTime '{}'", window.start_time)))?;
    let end = parse_clock(&window.end_time)
        .ok_or_else(|| InvalidWindow::new(format!("unparseable endTime '{}'", window.end_time)))?;
    if start == end {
        return Err(InvalidWindow::new("surge window startTime equals endTime"));
    }

    let local = instant.with_timezone(&tz);
    if !window.days_of_week.is_empty() && !window.days_of_week.contains(&local.weekday()) {
        return Ok(false);
    }

    let minute = local.hour() * 60 + local.minute();
    Ok(if start < end {
        start <= minute && minute < end
    } else {
        minute >= start || minute < end
    })
}
