//! Staff eligibility and working-hour management

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};

use crate::{
    error::{AppError, AppResult},
    models::{
        business::{Business, StaffMember},
        staff_availability::{
            check_windows, is_valid_window, AvailabilityStatus, AvailabilityWindow, BulkAvailability,
            SetAvailability, StaffAvailability, SyncAvailability, SyncReport,
        },
        time_slot::{SlotKey, TimeSlot},
    },
    repository::Repository,
    slots::{DayHours, WeeklyHours},
};

use super::availability::AvailabilityService;

/// Days written by a sync run when the caller gives no range
const DEFAULT_SYNC_DAYS: i64 = 30;

#[derive(Clone)]
pub struct StaffService {
    repository: Repository,
    availability: AvailabilityService,
}

impl StaffService {
    pub fn new(repository: Repository, availability: AvailabilityService) -> Self {
        Self {
            repository,
            availability,
        }
    }

    /// Staff who may serve `slot`
    ///
    /// A pinned slot yields its staff member alone while they remain on the
    /// roster. Otherwise: roster members authorized for the service with at
    /// least one available window containing the slot (any window suffices).
    pub async fn find_eligible_staff(
        &self,
        business: &Business,
        slot: &TimeSlot,
    ) -> AppResult<Vec<StaffMember>> {
        if let Some(staff_id) = slot.staff_id {
            return Ok(self
                .repository
                .catalog
                .staff_member(business.id, staff_id)
                .await?
                .into_iter()
                .collect());
        }

        let authorized: BTreeSet<i32> = self
            .repository
            .catalog
            .service_staff(slot.service_id, slot.venue_id)
            .await?
            .into_iter()
            .collect();
        if authorized.is_empty() {
            return Ok(Vec::new());
        }

        let (start, end) = (slot.starts_at(), slot.ends_at());
        let available: BTreeSet<i32> = self
            .repository
            .staff_availability
            .for_date(business.id, slot.date)
            .await?
            .into_iter()
            .filter(|w| w.venue_id.map_or(true, |v| v == slot.venue_id))
            .filter(|w| w.covers(start, end))
            .map(|w| w.user_id)
            .collect();

        Ok(self
            .repository
            .catalog
            .staff_roster(business.id)
            .await?
            .into_iter()
            .filter(|m| authorized.contains(&m.user_id) && available.contains(&m.user_id))
            .collect())
    }

    /// Eligible staff for a slot token; the slot row is materialized on first use
    pub async fn list_eligible_staff(
        &self,
        business_id: i32,
        service_id: i32,
        slot_id: &str,
    ) -> AppResult<Vec<StaffMember>> {
        let key: SlotKey = slot_id.parse().map_err(AppError::BadRequest)?;
        let business = self.repository.catalog.business(business_id).await?;
        let service = self.repository.catalog.service(business_id, service_id).await?;
        let slot = self
            .availability
            .ensure_slot(&business, &service, &key, false)
            .await?;

        self.find_eligible_staff(&business, &slot).await
    }

    async fn require_staff(&self, business_id: i32, user_id: i32) -> AppResult<StaffMember> {
        self.repository
            .catalog
            .staff_member(business_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "User {} is not a staff member of business {}",
                    user_id, business_id
                ))
            })
    }

    pub async fn get_availability(
        &self,
        business_id: i32,
        user_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StaffAvailability>> {
        if to < from {
            return Err(AppError::Validation("'to' must not be before 'from'".to_string()));
        }
        self.require_staff(business_id, user_id).await?;
        self.repository
            .staff_availability
            .for_staff(business_id, user_id, from, to)
            .await
    }

    /// Replace one date's windows
    pub async fn set_availability(
        &self,
        business_id: i32,
        user_id: i32,
        request: SetAvailability,
    ) -> AppResult<Vec<StaffAvailability>> {
        self.require_staff(business_id, user_id).await?;
        check_windows(&request.windows).map_err(AppError::Validation)?;

        let date = request.date;
        self.repository
            .staff_availability
            .replace_days(business_id, user_id, &[(date, request.windows)])
            .await?;

        tracing::info!(business_id, user_id, %date, "Staff availability replaced");
        self.repository
            .staff_availability
            .for_staff(business_id, user_id, date, date)
            .await
    }

    /// Write the same window on every listed date; returns rows written
    pub async fn bulk_set_availability(
        &self,
        business_id: i32,
        user_id: i32,
        request: BulkAvailability,
    ) -> AppResult<usize> {
        self.require_staff(business_id, user_id).await?;
        check_windows(std::slice::from_ref(&request.window)).map_err(AppError::Validation)?;

        let dates: BTreeSet<NaiveDate> = request.dates.into_iter().collect();
        let days: Vec<(NaiveDate, Vec<AvailabilityWindow>)> = dates
            .into_iter()
            .map(|date| (date, vec![request.window.clone()]))
            .collect();

        let written = self
            .repository
            .staff_availability
            .replace_days(business_id, user_id, &days)
            .await?;

        tracing::info!(business_id, user_id, days = days.len(), "Staff availability bulk update");
        Ok(written)
    }

    /// Mirror opening hours into staff availability
    ///
    /// Each open day gets one window equal to the day's hours; closed days
    /// and days whose hours run past midnight are left untouched.
    pub async fn sync_availability(
        &self,
        business_id: i32,
        request: SyncAvailability,
    ) -> AppResult<SyncReport> {
        let business = self.repository.catalog.business(business_id).await?;
        let staff: Vec<i32> = match request.staff_id {
            Some(user_id) => vec![self.require_staff(business_id, user_id).await?.user_id],
            None => self
                .repository
                .catalog
                .staff_roster(business_id)
                .await?
                .into_iter()
                .map(|m| m.user_id)
                .collect(),
        };
        if let Some(venue_id) = request.venue_id {
            self.repository.catalog.venue(business_id, venue_id).await?;
        }

        let hours = WeeklyHours::from_json(business.opening_hours.as_ref(), business.id);
        let from = request
            .from
            .unwrap_or_else(|| self.availability.local_today(&business));
        let span = request.days.unwrap_or(DEFAULT_SYNC_DAYS).max(0);

        let mut report = SyncReport {
            staff: staff.len(),
            ..SyncReport::default()
        };
        let mut days = Vec::new();
        for offset in 0..span {
            let date = from + Duration::days(offset);
            match hours.day(date.weekday()) {
                DayHours::Open { start, end } if is_valid_window(start, end) => days.push((
                    date,
                    vec![AvailabilityWindow {
                        venue_id: request.venue_id,
                        start_time: start,
                        end_time: end,
                        status: AvailabilityStatus::Available,
                        notes: None,
                    }],
                )),
                _ => report.days_closed += 1,
            }
        }

        for user_id in staff {
            self.repository
                .staff_availability
                .replace_days(business_id, user_id, &days)
                .await?;
            report.days_written += days.len();
        }

        tracing::info!(
            business_id,
            staff = report.staff,
            days_written = report.days_written,
            "Staff availability synced with opening hours"
        );
        Ok(report)
    }
}
