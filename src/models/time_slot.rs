//! Time slot capacity ledger entries

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::text_enum_sqlx;

// ---------------------------------------------------------------------------
// SlotStatus
// ---------------------------------------------------------------------------

/// Derived slot status; `Blocked` is set administratively and overrides counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SlotStatus {
    Available,
    FullyBooked,
    Blocked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::FullyBooked => "fully-booked",
            SlotStatus::Blocked => "blocked",
        }
    }

    /// Status implied by the counters alone
    pub fn from_counters(booked: i32, capacity: i32) -> Self {
        if booked >= capacity {
            SlotStatus::FullyBooked
        } else {
            SlotStatus::Available
        }
    }
}

impl std::str::FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SlotStatus::Available),
            "fully-booked" => Ok(SlotStatus::FullyBooked),
            "blocked" => Ok(SlotStatus::Blocked),
            _ => Err(format!("Invalid slot status: {}", s)),
        }
    }
}

text_enum_sqlx!(SlotStatus);

// ---------------------------------------------------------------------------
// SlotKey
// ---------------------------------------------------------------------------

/// Natural identity of a bookable interval
///
/// Rendered on the wire as `{business}_{venue}_{service}_{staff|any}_{YYYY-MM-DD}_{HHMM}`,
/// so a generated candidate and the row later materialized for it share one id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub business_id: i32,
    pub venue_id: i32,
    pub service_id: i32,
    pub staff_id: Option<i32>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

impl SlotKey {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn token(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let staff = self
            .staff_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "any".to_string());
        write!(
            f,
            "{}_{}_{}_{}_{}_{}",
            self.business_id,
            self.venue_id,
            self.service_id,
            staff,
            self.date.format("%Y-%m-%d"),
            self.start_time.format("%H%M")
        )
    }
}

impl std::str::FromStr for SlotKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 6 {
            return Err(format!("Invalid slot id: {}", s));
        }

        let int = |v: &str, what: &str| {
            v.parse::<i32>()
                .map_err(|_| format!("Invalid {} in slot id: {}", what, s))
        };

        let staff_id = match parts[3] {
            "any" => None,
            v => Some(int(v, "staff")?),
        };
        let date = NaiveDate::parse_from_str(parts[4], "%Y-%m-%d")
            .map_err(|_| format!("Invalid date in slot id: {}", s))?;
        let start_time = NaiveTime::parse_from_str(parts[5], "%H%M")
            .map_err(|_| format!("Invalid start time in slot id: {}", s))?;

        Ok(SlotKey {
            business_id: int(parts[0], "business")?,
            venue_id: int(parts[1], "venue")?,
            service_id: int(parts[2], "service")?,
            staff_id,
            date,
            start_time,
        })
    }
}

// ---------------------------------------------------------------------------
// TimeSlot
// ---------------------------------------------------------------------------

/// Why a reservation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    Blocked,
    Exhausted { remaining: i32 },
}

impl std::fmt::Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Refusal::Blocked => write!(f, "slot is blocked"),
            Refusal::Exhausted { remaining } => {
                write!(f, "only {} seat(s) remaining", remaining)
            }
        }
    }
}

/// Persisted capacity ledger row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TimeSlot {
    pub id: i32,
    pub business_id: i32,
    pub venue_id: i32,
    pub service_id: i32,
    pub staff_id: Option<i32>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub booked: i32,
    pub status: SlotStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeSlot {
    /// Build a fresh row for `key` (id is assigned by the store)
    pub fn new(id: i32, key: &SlotKey, defaults: &SlotDefaults, now: DateTime<Utc>) -> Self {
        Self {
            id,
            business_id: key.business_id,
            venue_id: key.venue_id,
            service_id: key.service_id,
            staff_id: key.staff_id,
            date: key.date,
            start_time: key.start_time,
            end_time: defaults.end_time,
            capacity: defaults.capacity,
            booked: 0,
            status: SlotStatus::Available,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> SlotKey {
        SlotKey {
            business_id: self.business_id,
            venue_id: self.venue_id,
            service_id: self.service_id,
            staff_id: self.staff_id,
            date: self.date,
            start_time: self.start_time,
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// Local end; an end time at or before the start belongs to the next day
    pub fn ends_at(&self) -> NaiveDateTime {
        if self.end_time <= self.start_time {
            (self.date + Duration::days(1)).and_time(self.end_time)
        } else {
            self.date.and_time(self.end_time)
        }
    }

    pub fn remaining(&self) -> i32 {
        (self.capacity - self.booked).max(0)
    }

    pub fn is_bookable(&self) -> bool {
        self.status != SlotStatus::Blocked && self.booked < self.capacity
    }

    /// Take `count` seats; on refusal the slot is left untouched
    pub fn reserve(&mut self, count: i32) -> Result<(), Refusal> {
        if self.status == SlotStatus::Blocked {
            return Err(Refusal::Blocked);
        }
        if self.booked + count > self.capacity {
            return Err(Refusal::Exhausted {
                remaining: self.remaining(),
            });
        }
        self.booked += count;
        self.status = SlotStatus::from_counters(self.booked, self.capacity);
        Ok(())
    }

    /// Give back `count` seats, never going below zero; a blocked slot stays blocked
    pub fn release(&mut self, count: i32) {
        self.booked = (self.booked - count).max(0);
        if self.status != SlotStatus::Blocked {
            self.status = SlotStatus::from_counters(self.booked, self.capacity);
        }
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.status = if blocked {
            SlotStatus::Blocked
        } else {
            SlotStatus::from_counters(self.booked, self.capacity)
        };
    }

    /// Override the seat count; refused below the seats already taken
    pub fn set_capacity(&mut self, capacity: i32) -> Result<(), String> {
        if capacity < 1 {
            return Err("Capacity must be at least 1".to_string());
        }
        if capacity < self.booked {
            return Err(format!(
                "Capacity {} is below the {} seat(s) already booked",
                capacity, self.booked
            ));
        }
        self.capacity = capacity;
        if self.status != SlotStatus::Blocked {
            self.status = SlotStatus::from_counters(self.booked, self.capacity);
        }
        Ok(())
    }
}

/// Values used when a slot row is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDefaults {
    pub end_time: NaiveTime,
    pub capacity: i32,
}

/// A slot as shown to callers, persisted or not
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlotView {
    /// Identity-key token, usable for staff lookup and booking
    pub slot_id: String,
    pub date: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub capacity: i32,
    pub booked: i32,
    pub status: SlotStatus,
    pub staff_id: Option<i32>,
    pub available: bool,
    /// Whether a ledger row exists yet
    pub persisted: bool,
}

/// Slot capacity override request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSlotCapacity {
    pub capacity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SlotKey {
        SlotKey {
            business_id: 3,
            venue_id: 7,
            service_id: 11,
            staff_id: None,
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        }
    }

    fn slot(capacity: i32) -> TimeSlot {
        TimeSlot::new(
            1,
            &key(),
            &SlotDefaults {
                end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
                capacity,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_slot_key_token() {
        let k = key();
        assert_eq!(k.token(), "3_7_11_any_2026-10-19_0930");
        assert_eq!(k.token().parse::<SlotKey>().unwrap(), k);

        let pinned = SlotKey { staff_id: Some(42), ..key() };
        assert_eq!(pinned.token(), "3_7_11_42_2026-10-19_0930");
        assert_eq!(pinned.token().parse::<SlotKey>().unwrap(), pinned);
    }

    #[test]
    fn test_slot_key_rejects_garbage() {
        assert!("3_7_11".parse::<SlotKey>().is_err());
        assert!("3_7_x_any_2026-10-19_0930".parse::<SlotKey>().is_err());
        assert!("3_7_11_any_2026-13-19_0930".parse::<SlotKey>().is_err());
        assert!("3_7_11_any_2026-10-19_2575".parse::<SlotKey>().is_err());
    }

    #[test]
    fn test_reserve_fills_slot() {
        let mut s = slot(2);
        s.reserve(1).unwrap();
        assert_eq!(s.status, SlotStatus::Available);
        s.reserve(1).unwrap();
        assert_eq!(s.booked, 2);
        assert_eq!(s.status, SlotStatus::FullyBooked);
        assert_eq!(s.reserve(1), Err(Refusal::Exhausted { remaining: 0 }));
        assert_eq!(s.booked, 2);
    }

    #[test]
    fn test_reserve_refuses_blocked() {
        let mut s = slot(5);
        s.set_blocked(true);
        assert_eq!(s.reserve(1), Err(Refusal::Blocked));
        assert_eq!(s.booked, 0);
        assert!(!s.is_bookable());
    }

    #[test]
    fn test_release_floors_at_zero() {
        let mut s = slot(2);
        s.reserve(2).unwrap();
        s.release(1);
        assert_eq!(s.booked, 1);
        assert_eq!(s.status, SlotStatus::Available);
        s.release(5);
        assert_eq!(s.booked, 0);
    }

    #[test]
    fn test_release_keeps_block() {
        let mut s = slot(2);
        s.reserve(1).unwrap();
        s.set_blocked(true);
        s.release(1);
        assert_eq!(s.status, SlotStatus::Blocked);
        s.set_blocked(false);
        assert_eq!(s.status, SlotStatus::Available);
    }

    #[test]
    fn test_capacity_override() {
        let mut s = slot(3);
        s.reserve(2).unwrap();
        assert!(s.set_capacity(1).is_err());
        assert!(s.set_capacity(0).is_err());
        s.set_capacity(2).unwrap();
        assert_eq!(s.status, SlotStatus::FullyBooked);
        s.set_capacity(4).unwrap();
        assert_eq!(s.status, SlotStatus::Available);
    }

    #[test]
    fn test_overnight_end() {
        let mut s = slot(1);
        s.start_time = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        s.end_time = NaiveTime::from_hms_opt(0, 30, 0).unwrap();
        assert_eq!(s.ends_at() - s.starts_at(), Duration::hours(1));
    }
}
