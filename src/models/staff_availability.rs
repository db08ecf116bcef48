//! Staff working-hour windows

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::text_enum_sqlx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AvailabilityStatus {
    Available,
    Unavailable,
    OnLeave,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Available => "available",
            AvailabilityStatus::Unavailable => "unavailable",
            AvailabilityStatus::OnLeave => "on-leave",
        }
    }
}

impl std::str::FromStr for AvailabilityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(AvailabilityStatus::Available),
            "unavailable" => Ok(AvailabilityStatus::Unavailable),
            "on-leave" => Ok(AvailabilityStatus::OnLeave),
            _ => Err(format!("Invalid availability status: {}", s)),
        }
    }
}

text_enum_sqlx!(AvailabilityStatus);

/// One working window of a staff member on a date
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StaffAvailability {
    pub id: i32,
    pub user_id: i32,
    pub business_id: i32,
    pub venue_id: Option<i32>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub status: AvailabilityStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StaffAvailability {
    /// Whether this window makes its owner eligible for `[start, end]`
    pub fn covers(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        if !self.is_available || self.status != AvailabilityStatus::Available {
            return false;
        }
        let from = self.date.and_time(self.start_time);
        let to = window_end(self.date, self.end_time);
        from <= start && end <= to
    }
}

/// End of a same-date window; `00:00` closes the window at the following midnight
pub fn window_end(date: NaiveDate, end_time: NaiveTime) -> NaiveDateTime {
    if end_time == NaiveTime::MIN {
        (date + Duration::days(1)).and_time(NaiveTime::MIN)
    } else {
        date.and_time(end_time)
    }
}

/// Whether `[start, end)` is a non-empty window on one date
pub fn is_valid_window(start_time: NaiveTime, end_time: NaiveTime) -> bool {
    end_time == NaiveTime::MIN || start_time < end_time
}

/// A window as submitted by a caller
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AvailabilityWindow {
    pub venue_id: Option<i32>,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "17:00:00")]
    pub end_time: NaiveTime,
    pub status: AvailabilityStatus,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

impl AvailabilityWindow {
    pub fn is_available(&self) -> bool {
        self.status == AvailabilityStatus::Available
    }
}

/// Check a date's windows: each must have `start < end` (an end of `00:00` is midnight),
/// and start times must be distinct
pub fn check_windows(windows: &[AvailabilityWindow]) -> Result<(), String> {
    for w in windows {
        if !is_valid_window(w.start_time, w.end_time) {
            return Err(format!(
                "Window {}-{} must end after it starts",
                w.start_time.format("%H:%M"),
                w.end_time.format("%H:%M")
            ));
        }
    }
    let mut starts: Vec<(Option<i32>, NaiveTime)> =
        windows.iter().map(|w| (w.venue_id, w.start_time)).collect();
    starts.sort();
    if let Some(pair) = starts.windows(2).find(|p| p[0] == p[1]) {
        return Err(format!(
            "Duplicate window starting at {}",
            pair[0].1.format("%H:%M")
        ));
    }
    Ok(())
}

/// Replace one date's windows
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetAvailability {
    #[schema(value_type = String, example = "2026-10-19")]
    pub date: NaiveDate,
    #[validate(nested)]
    pub windows: Vec<AvailabilityWindow>,
}

/// Write the same window on several dates
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkAvailability {
    #[validate(length(min = 1, max = 366, message = "Between 1 and 366 dates are required"))]
    #[schema(value_type = Vec<String>)]
    pub dates: Vec<NaiveDate>,
    #[validate(nested)]
    pub window: AvailabilityWindow,
}

/// Mirror the business opening hours into staff availability
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SyncAvailability {
    /// Only this staff member; the whole roster when absent
    pub staff_id: Option<i32>,
    /// First date; defaults to the business-local today
    #[schema(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[validate(range(min = 1, max = 366, message = "Days must be between 1 and 366"))]
    pub days: Option<i64>,
    pub venue_id: Option<i32>,
}

/// Outcome of a sync run
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SyncReport {
    pub staff: usize,
    pub days_written: usize,
    pub days_closed: usize,
}
