//! Weekly opening hours
//!
//! Two stored shapes are accepted for a day entry:
//!
//! ```json
//! {"is_open": true, "start": "09:00", "end": "17:00"}
//! {"closed": false, "open": "09:00", "close": "17:00"}
//! ```
//!
//! The whole document may also arrive as a JSON-encoded string. Anything
//! that cannot be understood resolves to closed.

use chrono::{NaiveTime, Weekday};
use serde_json::{Map, Value};
use thiserror::Error;

/// Data-quality problem in a stored opening-hours document
#[derive(Debug, Error)]
pub enum OpeningHoursError {
    #[error("opening hours are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("opening hours must be an object keyed by weekday, got {0}")]
    NotAnObject(&'static str),

    #[error("{day}: entry must be an object or null")]
    BadEntry { day: &'static str },

    #[error("{day}: invalid time {value:?}")]
    BadTime { day: &'static str, value: String },
}

/// Canonical hours for one weekday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayHours {
    #[default]
    Closed,
    /// `end <= start` means the day closes after midnight
    Open { start: NaiveTime, end: NaiveTime },
}

impl DayHours {
    pub fn is_open(&self) -> bool {
        matches!(self, DayHours::Open { .. })
    }
}

/// Canonical hours for a whole week, indexed from Monday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeeklyHours {
    days: [DayHours; 7],
}

pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl WeeklyHours {
    pub fn day(&self, weekday: Weekday) -> DayHours {
        self.days[weekday.num_days_from_monday() as usize]
    }

    pub fn is_open_on(&self, weekday: Weekday) -> bool {
        self.day(weekday).is_open()
    }

    /// Strict parse; the first problem found is returned
    pub fn try_from_json(value: Option<&Value>) -> Result<Self, OpeningHoursError> {
        let mut hours = WeeklyHours::default();
        let Some(map) = document(value)? else {
            return Ok(hours);
        };
        for weekday in WEEK {
            let name = day_name(weekday);
            hours.days[weekday.num_days_from_monday() as usize] = parse_entry(name, map.get(name))?;
        }
        Ok(hours)
    }

    /// Lenient parse: an unreadable document is closed all week, an
    /// unreadable day is closed that day. Problems are logged.
    pub fn from_json(value: Option<&Value>, business_id: i32) -> Self {
        let map = match document(value) {
            Ok(Some(map)) => map,
            Ok(None) => return WeeklyHours::default(),
            Err(e) => {
                tracing::warn!(business_id, error = %e, "Invalid opening hours, treating as closed");
                return WeeklyHours::default();
            }
        };

        let mut hours = WeeklyHours::default();
        for weekday in WEEK {
            let name = day_name(weekday);
            match parse_entry(name, map.get(name)) {
                Ok(day) => hours.days[weekday.num_days_from_monday() as usize] = day,
                Err(e) => {
                    tracing::warn!(business_id, error = %e, "Invalid opening hours, treating day as closed");
                }
            }
        }
        hours
    }
}

/// Resolve one weekday of a stored document, closed on any problem
pub fn resolve_day(value: Option<&Value>, weekday: Weekday, business_id: i32) -> DayHours {
    WeeklyHours::from_json(value, business_id).day(weekday)
}

/// Unwrap the document, decoding a JSON string when needed. `None` means no hours at all.
fn document(value: Option<&Value>) -> Result<Option<Map<String, Value>>, OpeningHoursError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(Value::String(s)) => {
            if s.trim().is_empty() {
                return Ok(None);
            }
            let decoded: Value = serde_json::from_str(s)?;
            match decoded {
                Value::String(_) => Err(OpeningHoursError::NotAnObject("a nested string")),
                other => document(Some(&other)),
            }
        }
        Some(Value::Array(_)) => Err(OpeningHoursError::NotAnObject("an array")),
        Some(Value::Bool(_)) => Err(OpeningHoursError::NotAnObject("a boolean")),
        Some(Value::Number(_)) => Err(OpeningHoursError::NotAnObject("a number")),
    }
}

fn parse_entry(day: &'static str, entry: Option<&Value>) -> Result<DayHours, OpeningHoursError> {
    let obj = match entry {
        None | Some(Value::Null) => return Ok(DayHours::Closed),
        Some(Value::Object(obj)) => obj,
        Some(_) => return Err(OpeningHoursError::BadEntry { day }),
    };

    let (open, start_key, end_key) = if obj.contains_key("is_open") {
        (obj.get("is_open").and_then(Value::as_bool).unwrap_or(false), "start", "end")
    } else {
        // A missing `closed` flag counts as closed
        let closed = obj.get("closed").and_then(Value::as_bool).unwrap_or(true);
        (!closed, "open", "close")
    };

    if !open {
        return Ok(DayHours::Closed);
    }

    match (time_field(day, obj, start_key)?, time_field(day, obj, end_key)?) {
        (Some(start), Some(end)) => Ok(DayHours::Open { start, end }),
        _ => Ok(DayHours::Closed),
    }
}

fn time_field(
    day: &'static str,
    obj: &Map<String, Value>,
    key: &str,
) -> Result<Option<NaiveTime>, OpeningHoursError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => parse_time(s)
            .map(Some)
            .ok_or_else(|| OpeningHoursError::BadTime { day, value: s.clone() }),
        Some(other) => Err(OpeningHoursError::BadTime { day, value: other.to_string() }),
    }
}

/// Accepts `HH:MM` and `HH:MM:SS`
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}
