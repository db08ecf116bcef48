//! Slot tiling
//!
//! Cuts a day's open interval into back-to-back intervals of the service
//! duration. A trailing remainder shorter than the duration is dropped.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use super::hours::{DayHours, WeeklyHours};

/// One candidate interval in business-local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Lazy iterator over the intervals of one day; call [`tile`] again for a fresh sequence
#[derive(Debug, Clone)]
pub struct SlotTiling {
    cursor: NaiveDateTime,
    end: NaiveDateTime,
    step: Duration,
}

impl SlotTiling {
    fn empty() -> Self {
        Self {
            cursor: NaiveDateTime::MIN,
            end: NaiveDateTime::MIN,
            step: Duration::zero(),
        }
    }
}

impl Iterator for SlotTiling {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        if self.step <= Duration::zero() {
            return None;
        }
        let next = self.cursor + self.step;
        if next > self.end {
            return None;
        }
        let interval = Interval { start: self.cursor, end: next };
        self.cursor = next;
        Some(interval)
    }
}

/// Tile the hours of `date`
///
/// Identical opening and closing times give nothing; a closing time earlier
/// than the opening time closes on the next day.
pub fn tile(day: DayHours, date: NaiveDate, duration: Duration) -> SlotTiling {
    let DayHours::Open { start, end } = day else {
        return SlotTiling::empty();
    };
    if duration <= Duration::zero() {
        tracing::warn!(%date, minutes = duration.num_minutes(), "Non-positive service duration, no slots generated");
        return SlotTiling::empty();
    }
    if start == end {
        return SlotTiling::empty();
    }

    let cursor = date.and_time(start);
    let mut close = date.and_time(end);
    if close <= cursor {
        close += Duration::days(1);
    }

    SlotTiling { cursor, end: close, step: duration }
}

/// Intervals for `date` under a weekly schedule
pub fn generate(hours: &WeeklyHours, date: NaiveDate, duration: Duration) -> SlotTiling {
    tile(hours.day(date.weekday()), date, duration)
}
