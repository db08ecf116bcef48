//! Catalog read models: businesses, venues, services and the staff roster
//!
//! These rows are owned by the record-management layer; the booking engine
//! only reads them.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A business publishing bookable services
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Business {
    pub id: i32,
    pub name: String,
    /// Weekly opening hours, keyed by lowercase English weekday name
    #[schema(value_type = Object)]
    pub opening_hours: Option<serde_json::Value>,
    /// IANA timezone of the business wall clock
    pub timezone: String,
}

impl Business {
    /// Timezone used to turn local slot times into absolute instants
    pub fn tz(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(
                    business_id = self.id,
                    timezone = %self.timezone,
                    "Unknown timezone, falling back to UTC"
                );
                Tz::UTC
            }
        }
    }

    /// Convert a local wall-clock time of this business to UTC
    pub fn local_to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        local_to_utc(self.tz(), local)
    }
}

/// Resolve a local time in `tz`; times inside a DST gap are shifted one hour forward
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

/// A physical location of a business
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Venue {
    pub id: i32,
    pub business_id: i32,
    pub name: String,
    pub is_primary: bool,
}

/// A bookable service
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Service {
    pub id: i32,
    pub business_id: i32,
    pub name: String,
    /// Duration in minutes
    pub duration: i32,
    #[schema(value_type = String)]
    pub price: Decimal,
    /// Default seat count per slot
    pub capacity: i32,
    /// "active" or "inactive"
    pub status: String,
}

impl Service {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration as i64)
    }
}

/// A member of a business roster, joined with the user record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StaffMember {
    pub user_id: i32,
    pub business_id: i32,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub specialties: Vec<String>,
    pub experience: Option<String>,
    pub languages: Vec<String>,
}
