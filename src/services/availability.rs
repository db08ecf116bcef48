//! Slot availability service
//!
//! Bridges the pure interval generator and the persisted capacity ledger:
//! candidates are matched against stored rows by identity key, and rows are
//! materialized only when a caller interacts with a slot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use chrono_tz::Tz;

use crate::{
    config::BookingConfig,
    error::{AppError, AppResult},
    models::{
        business::{Business, Service},
        time_slot::{SlotDefaults, SlotKey, SlotStatus, SlotView, TimeSlot},
    },
    repository::Repository,
    slots::{generate, Interval, WeeklyHours},
};

use super::clock::Clock;

#[derive(Clone)]
pub struct AvailabilityService {
    repository: Repository,
    config: BookingConfig,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(repository: Repository, config: BookingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            config,
            clock,
        }
    }

    /// Today in the business timezone
    pub fn local_today(&self, business: &Business) -> NaiveDate {
        self.clock.now().with_timezone::<Tz>(&business.tz()).date_naive()
    }

    /// Slots of `date` for a service, live counters included
    ///
    /// Without `staff_id` only unpinned slots are listed; with it, the slots
    /// pinned to that staff member.
    pub async fn list_available_slots(
        &self,
        business_id: i32,
        service_id: i32,
        date: NaiveDate,
        staff_id: Option<i32>,
        venue_id: Option<i32>,
    ) -> AppResult<Vec<SlotView>> {
        let business = self.repository.catalog.business(business_id).await?;
        let service = self.repository.catalog.service(business_id, service_id).await?;
        if !service.is_active() {
            return Ok(Vec::new());
        }
        let venue = match venue_id {
            Some(id) => self.repository.catalog.venue(business_id, id).await?,
            None => self.repository.catalog.primary_venue(business_id).await?,
        };

        let hours = WeeklyHours::from_json(business.opening_hours.as_ref(), business.id);
        let intervals: Vec<Interval> = generate(&hours, date, service.duration()).collect();
        if intervals.is_empty() {
            return Ok(Vec::new());
        }

        // Overnight hours put later intervals on the next calendar date
        let mut stored: HashMap<(NaiveDate, NaiveTime), TimeSlot> = HashMap::new();
        let mut dates: Vec<NaiveDate> = intervals.iter().map(|i| i.start.date()).collect();
        dates.dedup();
        for day in dates {
            for slot in self
                .repository
                .slots
                .find_for_date(business_id, venue.id, service_id, day)
                .await?
            {
                if slot.staff_id == staff_id {
                    stored.insert((slot.date, slot.start_time), slot);
                }
            }
        }

        let now = self.clock.now();
        let views = intervals
            .into_iter()
            .map(|interval| {
                let key = SlotKey {
                    business_id,
                    venue_id: venue.id,
                    service_id,
                    staff_id,
                    date: interval.start.date(),
                    start_time: interval.start.time(),
                };
                let started = business.local_to_utc(interval.start) <= now;

                match stored.get(&(key.date, key.start_time)) {
                    Some(slot) => SlotView {
                        slot_id: key.token(),
                        date: key.date,
                        start: slot.starts_at(),
                        end: slot.ends_at(),
                        capacity: slot.capacity,
                        booked: slot.booked,
                        status: slot.status,
                        staff_id,
                        available: slot.is_bookable() && !started,
                        persisted: true,
                    },
                    None => SlotView {
                        slot_id: key.token(),
                        date: key.date,
                        start: interval.start,
                        end: interval.end,
                        capacity: service.capacity,
                        booked: 0,
                        status: SlotStatus::Available,
                        staff_id,
                        available: !started,
                        persisted: false,
                    },
                }
            })
            .collect();

        Ok(views)
    }

    /// Open dates from the business-local today, `range_days` long
    pub async fn list_available_dates(
        &self,
        business_id: i32,
        service_id: i32,
        range_days: Option<i64>,
    ) -> AppResult<Vec<NaiveDate>> {
        let business = self.repository.catalog.business(business_id).await?;
        let service = self.repository.catalog.service(business_id, service_id).await?;
        if !service.is_active() {
            return Ok(Vec::new());
        }

        let days = range_days
            .unwrap_or(self.config.booking_window_days)
            .clamp(0, self.config.max_booking_window_days);
        let hours = WeeklyHours::from_json(business.opening_hours.as_ref(), business.id);
        let today = self.local_today(&business);

        Ok((0..days)
            .map(|offset| today + Duration::days(offset))
            .filter(|date| hours.is_open_on(date.weekday()))
            .collect())
    }

    /// The generated interval named by `key`, if the schedule produces one
    fn candidate(&self, business: &Business, service: &Service, key: &SlotKey) -> Option<Interval> {
        let hours = WeeklyHours::from_json(business.opening_hours.as_ref(), business.id);
        let start = key.starts_at();
        // An interval may belong to the previous business day when hours run past midnight
        [key.date, key.date - Duration::days(1)]
            .into_iter()
            .flat_map(|day| generate(&hours, day, service.duration()))
            .find(|interval| interval.start == start)
    }

    /// Resolve `key` to its ledger row, materializing it when the schedule allows
    ///
    /// With `require_future`, slots that already started are refused.
    pub async fn ensure_slot(
        &self,
        business: &Business,
        service: &Service,
        key: &SlotKey,
        require_future: bool,
    ) -> AppResult<TimeSlot> {
        if key.business_id != business.id || key.service_id != service.id {
            return Err(AppError::Validation(format!(
                "Slot {} does not belong to service {} of business {}",
                key, service.id, business.id
            )));
        }

        let slot = match self.repository.slots.find(key).await? {
            Some(slot) => slot,
            None => {
                let interval = self.candidate(business, service, key).ok_or_else(|| {
                    AppError::SlotUnavailable(format!("No bookable slot starts at {}", key.starts_at()))
                })?;
                self.repository.catalog.venue(business.id, key.venue_id).await?;
                if let Some(staff_id) = key.staff_id {
                    if self
                        .repository
                        .catalog
                        .staff_member(business.id, staff_id)
                        .await?
                        .is_none()
                    {
                        return Err(AppError::Validation(format!(
                            "User {} is not a staff member of business {}",
                            staff_id, business.id
                        )));
                    }
                }
                let defaults = SlotDefaults {
                    end_time: interval.end.time(),
                    capacity: service.capacity,
                };
                self.repository.slots.get_or_create(key, &defaults).await?
            }
        };

        if require_future && business.local_to_utc(slot.starts_at()) <= self.clock.now() {
            return Err(AppError::SlotUnavailable(format!(
                "Slot {} has already started",
                key
            )));
        }

        Ok(slot)
    }
}
