//! Booking orchestration: create, cancel, reschedule and the later lifecycle steps
//!
//! Seat counts move only through [`BookingLedger`] calls, each of which is
//! atomic with the booking write it accompanies. Everything here runs before
//! that single call, so any refusal leaves the ledgers untouched.
//!
//! [`BookingLedger`]: crate::repository::BookingLedger

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use crate::{
    config::BookingConfig,
    error::{AppError, AppResult},
    models::{
        booking::{
            Booking, BookingStatus, CreateBooking, CustomerDetails, NewBooking, Rebinding,
            RescheduleBooking, ServiceDetails, Transition,
        },
        business::Business,
        time_slot::{SlotKey, TimeSlot},
    },
    repository::Repository,
};

use super::{availability::AvailabilityService, clock::Clock, retry::RetryPolicy, staff::StaffService};

/// The customer on whose behalf a booking is made
#[derive(Debug, Clone)]
pub struct Customer {
    pub user_id: i32,
    pub details: CustomerDetails,
}

#[derive(Clone)]
pub struct BookingService {
    repository: Repository,
    availability: AvailabilityService,
    staff: StaffService,
    config: BookingConfig,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl BookingService {
    pub fn new(
        repository: Repository,
        availability: AvailabilityService,
        staff: StaffService,
        config: BookingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config),
            repository,
            availability,
            staff,
            config,
            clock,
        }
    }

    fn lead_time(&self) -> Duration {
        Duration::hours(self.config.cancellation_lead_hours.max(0))
    }

    /// Check that `staff_id` may serve `slot`
    async fn check_staff(&self, business: &Business, slot: &TimeSlot, staff_id: i32) -> AppResult<()> {
        let eligible = self.staff.find_eligible_staff(business, slot).await?;
        if eligible.iter().any(|m| m.user_id == staff_id) {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Staff member {} is not available for slot {}",
                staff_id,
                slot.key()
            )))
        }
    }

    /// Explicit staff against a slot pin
    fn pick_pinned(slot: &TimeSlot, requested: Option<i32>) -> AppResult<Option<i32>> {
        match (slot.staff_id, requested) {
            (Some(pinned), Some(requested)) if pinned != requested => Err(AppError::Validation(
                format!("Slot {} is reserved for staff member {}", slot.key(), pinned),
            )),
            (pinned, requested) => Ok(pinned.or(requested)),
        }
    }

    /// Create a booking
    pub async fn create_booking(&self, request: CreateBooking, customer: Customer) -> AppResult<Booking> {
        if request.participants < 1 {
            return Err(AppError::Validation("At least one participant is required".to_string()));
        }
        let key: SlotKey = request.slot_id.parse().map_err(AppError::BadRequest)?;

        let business = self.repository.catalog.business(request.business_id).await?;
        let service = self
            .repository
            .catalog
            .service(request.business_id, request.service_id)
            .await?;
        if !service.is_active() {
            return Err(AppError::BusinessRule(format!(
                "Service {} is not open for booking",
                service.id
            )));
        }
        if request.participants > service.capacity {
            return Err(AppError::CapacityExceeded(format!(
                "{} participants requested, service {} takes at most {}",
                request.participants, service.id, service.capacity
            )));
        }

        let slot = self
            .availability
            .ensure_slot(&business, &service, &key, true)
            .await?;

        let staff_id = Self::pick_pinned(&slot, request.staff_id)?;
        if let Some(staff_id) = staff_id {
            self.check_staff(&business, &slot, staff_id).await?;
        }

        let status = match staff_id {
            Some(_) if self.config.auto_confirm => BookingStatus::Confirmed,
            Some(_) => BookingStatus::Pending,
            None => self.config.staffless_status.initial_status(),
        };

        let new = NewBooking {
            user_id: customer.user_id,
            business_id: business.id,
            venue_id: slot.venue_id,
            service_id: service.id,
            staff_id,
            time_slot_id: slot.id,
            start_time: business.local_to_utc(slot.starts_at()),
            end_time: business.local_to_utc(slot.ends_at()),
            participants: request.participants,
            total_price: service.price * Decimal::from(request.participants),
            status,
            customer_details: customer.details,
            service_details: ServiceDetails {
                name: service.name.clone(),
                duration: service.duration,
                price: service.price,
            },
            notes: request.notes,
        };

        let now = self.clock.now();
        let ledger = &self.repository.bookings;
        let booking = self
            .retry
            .run("create booking", move || ledger.reserve_and_insert(new.clone(), now))
            .await?;

        tracing::info!(
            booking_id = booking.id,
            slot = %key,
            participants = booking.participants,
            status = %booking.status,
            "Booking created"
        );
        Ok(booking)
    }

    /// Cancel a booking and give its seats back
    pub async fn cancel_booking(&self, booking_id: i32, reason: Option<String>) -> AppResult<Booking> {
        let booking = self.repository.bookings.get(booking_id).await?;
        let now = self.clock.now();

        if !booking.status.is_cancellable() {
            return Err(AppError::NotCancellable(format!(
                "Booking {} is {}",
                booking_id, booking.status
            )));
        }
        if !booking.can_be_changed(now, self.lead_time()) {
            return Err(AppError::NotCancellable(format!(
                "Booking {} starts within {} hour(s)",
                booking_id,
                self.lead_time().num_hours()
            )));
        }

        let ledger = &self.repository.bookings;
        let cancelled = self
            .retry
            .run("cancel booking", move || {
                ledger.cancel_and_release(booking_id, reason.clone(), now)
            })
            .await?;

        tracing::info!(
            booking_id,
            slot_id = cancelled.time_slot_id,
            participants = cancelled.participants,
            "Booking cancelled"
        );
        Ok(cancelled)
    }

    /// Move a booking to another slot, keeping its status
    pub async fn reschedule_booking(
        &self,
        booking_id: i32,
        request: RescheduleBooking,
    ) -> AppResult<Booking> {
        let booking = self.repository.bookings.get(booking_id).await?;
        let now = self.clock.now();

        if !booking.status.is_cancellable() {
            return Err(AppError::NotReschedulable(format!(
                "Booking {} is {}",
                booking_id, booking.status
            )));
        }
        if !booking.can_be_changed(now, self.lead_time()) {
            return Err(AppError::NotReschedulable(format!(
                "Booking {} starts within {} hour(s)",
                booking_id,
                self.lead_time().num_hours()
            )));
        }

        let key: SlotKey = request.slot_id.parse().map_err(AppError::BadRequest)?;
        let business = self.repository.catalog.business(booking.business_id).await?;
        let service = self
            .repository
            .catalog
            .service(booking.business_id, booking.service_id)
            .await?;
        let slot = self
            .availability
            .ensure_slot(&business, &service, &key, true)
            .await?;

        let staff_id = match Self::pick_pinned(&slot, request.staff_id)? {
            Some(id) => {
                self.check_staff(&business, &slot, id).await?;
                Some(id)
            }
            // Keep the current staff member when they can serve the new slot
            None => match booking.staff_id {
                Some(previous) => match self.check_staff(&business, &slot, previous).await {
                    Ok(()) => Some(previous),
                    Err(AppError::Validation(_)) => None,
                    Err(e) => return Err(e),
                },
                None => None,
            },
        };
        if staff_id.is_none() && booking.status == BookingStatus::Confirmed {
            return Err(AppError::NotReschedulable(format!(
                "Booking {} is confirmed and no staff member can serve slot {}",
                booking_id,
                slot.key()
            )));
        }

        let to = Rebinding {
            time_slot_id: slot.id,
            staff_id,
            start_time: business.local_to_utc(slot.starts_at()),
            end_time: business.local_to_utc(slot.ends_at()),
        };
        let from_slot = booking.time_slot_id;

        let ledger = &self.repository.bookings;
        let moved = self
            .retry
            .run("reschedule booking", move || {
                ledger.move_booking(booking_id, from_slot, to.clone(), now)
            })
            .await?;

        tracing::info!(
            booking_id,
            from_slot,
            to_slot = moved.time_slot_id,
            "Booking rescheduled"
        );
        Ok(moved)
    }

    async fn business_booking(&self, business_id: i32, booking_id: i32) -> AppResult<Booking> {
        let booking = self.repository.bookings.get(booking_id).await?;
        if booking.business_id != business_id {
            return Err(AppError::NotFound(format!("Booking with id {} not found", booking_id)));
        }
        Ok(booking)
    }

    /// Give a pending or unassigned booking a staff member
    pub async fn assign_staff(&self, business_id: i32, booking_id: i32, staff_id: i32) -> AppResult<Booking> {
        let booking = self.business_booking(business_id, booking_id).await?;
        if !booking.status.accepts_staff() {
            return Err(AppError::BusinessRule(format!(
                "Cannot assign staff to booking {} in status {}",
                booking_id, booking.status
            )));
        }

        let business = self.repository.catalog.business(business_id).await?;
        let slot = self.repository.slots.get(booking.time_slot_id).await?;
        Self::pick_pinned(&slot, Some(staff_id))?;
        self.check_staff(&business, &slot, staff_id).await?;

        let updated = self
            .repository
            .bookings
            .transition(booking_id, Transition::AssignStaff(staff_id), self.clock.now())
            .await?;
        tracing::info!(booking_id, staff_id, "Staff assigned");
        Ok(updated)
    }

    pub async fn confirm_booking(&self, business_id: i32, booking_id: i32) -> AppResult<Booking> {
        let booking = self.business_booking(business_id, booking_id).await?;
        if booking.staff_id.is_none() {
            return Err(AppError::BusinessRule(format!(
                "Booking {} needs a staff member before confirmation",
                booking_id
            )));
        }
        self.step(booking_id, Transition::Confirm).await
    }

    pub async fn complete_booking(&self, business_id: i32, booking_id: i32) -> AppResult<Booking> {
        self.business_booking(business_id, booking_id).await?;
        self.step(booking_id, Transition::Complete).await
    }

    pub async fn mark_no_show(&self, business_id: i32, booking_id: i32) -> AppResult<Booking> {
        self.business_booking(business_id, booking_id).await?;
        self.step(booking_id, Transition::NoShow).await
    }

    async fn step(&self, booking_id: i32, step: Transition) -> AppResult<Booking> {
        let updated = self
            .repository
            .bookings
            .transition(booking_id, step, self.clock.now())
            .await?;
        tracing::info!(booking_id, status = %updated.status, "Booking status changed");
        Ok(updated)
    }

    /// Soft delete a finished booking
    pub async fn archive_booking(&self, business_id: i32, booking_id: i32) -> AppResult<()> {
        self.business_booking(business_id, booking_id).await?;
        self.repository
            .bookings
            .archive(booking_id, self.clock.now())
            .await
    }

    pub async fn get_booking(&self, booking_id: i32) -> AppResult<Booking> {
        self.repository.bookings.get(booking_id).await
    }

    pub async fn list_customer_bookings(&self, user_id: i32) -> AppResult<Vec<Booking>> {
        self.repository.bookings.list_for_customer(user_id).await
    }

    async fn admin_slot(&self, business_id: i32, slot_id: &str) -> AppResult<TimeSlot> {
        let key: SlotKey = slot_id.parse().map_err(AppError::BadRequest)?;
        let business = self.repository.catalog.business(business_id).await?;
        let service = self.repository.catalog.service(business_id, key.service_id).await?;
        self.availability
            .ensure_slot(&business, &service, &key, false)
            .await
    }

    /// Block or unblock a slot; a blocked slot refuses new reservations
    pub async fn set_slot_blocked(&self, business_id: i32, slot_id: &str, blocked: bool) -> AppResult<TimeSlot> {
        let slot = self.admin_slot(business_id, slot_id).await?;
        let slots = &self.repository.slots;
        let updated = self
            .retry
            .run("block slot", move || slots.set_blocked(slot.id, blocked))
            .await?;
        tracing::info!(slot_id = updated.id, blocked, "Slot availability changed");
        Ok(updated)
    }

    /// Override a slot's seat count
    pub async fn set_slot_capacity(&self, business_id: i32, slot_id: &str, capacity: i32) -> AppResult<TimeSlot> {
        let slot = self.admin_slot(business_id, slot_id).await?;
        let slots = &self.repository.slots;
        let updated = self
            .retry
            .run("set slot capacity", move || slots.set_capacity(slot.id, capacity))
            .await?;
        tracing::info!(slot_id = updated.id, capacity, "Slot capacity changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StafflessPolicy,
        models::staff_availability::{AvailabilityStatus, AvailabilityWindow, SetAvailability},
        repository::{memory::MemoryStore, CatalogStore},
        services::{clock::FixedClock, Services},
    };
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use serde_json::json;

    struct Fixture {
        store: MemoryStore,
        services: Services,
        clock: Arc<FixedClock>,
        business: i32,
        service: i32,
        venue: i32,
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    async fn fixture(config: BookingConfig) -> Fixture {
        let store = MemoryStore::new();
        let business = store
            .add_business(
                "Studio",
                json!({"monday": {"is_open": true, "start": "09:00", "end": "17:00"}}),
                "Europe/Warsaw",
            )
            .await;
        let venue = store.add_venue(business, "Main", true).await;
        let service = store
            .add_service(business, "Pilates", 60, Decimal::new(4550, 2), 2)
            .await;
        // Friday 2026-10-16 10:00 UTC
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap()));
        let services = Services::new(Repository::in_memory(store.clone()), config, clock.clone());
        Fixture {
            store,
            services,
            clock,
            business,
            service,
            venue,
        }
    }

    fn slot(f: &Fixture, hour: u32, staff_id: Option<i32>) -> String {
        SlotKey {
            business_id: f.business,
            venue_id: f.venue,
            service_id: f.service,
            staff_id,
            date: monday(),
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        }
        .token()
    }

    fn request(f: &Fixture, slot_id: String, participants: i32, staff_id: Option<i32>) -> CreateBooking {
        CreateBooking {
            business_id: f.business,
            service_id: f.service,
            slot_id,
            staff_id,
            participants,
            notes: None,
        }
    }

    fn customer(user_id: i32) -> Customer {
        Customer {
            user_id,
            details: CustomerDetails {
                name: "Ada Lovelace".into(),
                email: Some("ada@example.com".into()),
                phone: None,
            },
        }
    }

    async fn staff_available(f: &Fixture) -> i32 {
        let ana = f.store.add_staff(f.business, "Ana").await;
        f.store.allow_service(f.service, ana, None).await;
        f.services
            .staff
            .set_availability(
                f.business,
                ana,
                SetAvailability {
                    date: monday(),
                    windows: vec![AvailabilityWindow {
                        venue_id: None,
                        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                        end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                        status: AvailabilityStatus::Available,
                        notes: None,
                    }],
                },
            )
            .await
            .unwrap();
        ana
    }

    #[tokio::test]
    async fn test_create_snapshots_and_prices() {
        let f = fixture(BookingConfig::default()).await;
        let booking = f
            .services
            .bookings
            .create_booking(request(&f, slot(&f, 9, None), 2, None), customer(7))
            .await
            .unwrap();

        assert_eq!(booking.total_price, Decimal::new(9100, 2));
        assert_eq!(booking.status, BookingStatus::Unassigned);
        assert_eq!(booking.customer_details.0.name, "Ada Lovelace");
        assert_eq!(booking.service_details.0.duration, 60);
        // Warsaw is still on summer time (+02:00) that Monday
        assert_eq!(booking.start_time, Utc.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap());
        assert_eq!(booking.end_time - booking.start_time, Duration::hours(1));

        let slots = f.store.slots().await;
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].booked, 2);
    }

    #[tokio::test]
    async fn test_staffless_policy_is_configurable() {
        let config = BookingConfig {
            staffless_status: StafflessPolicy::Pending,
            ..BookingConfig::default()
        };
        let f = fixture(config).await;
        let booking = f
            .services
            .bookings
            .create_booking(request(&f, slot(&f, 10, None), 1, None), customer(7))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_resolved_staff_starts_pending_or_confirmed() {
        let f = fixture(BookingConfig::default()).await;
        let ana = staff_available(&f).await;
        let pending = f
            .services
            .bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, Some(ana)), customer(7))
            .await
            .unwrap();
        assert_eq!(pending.status, BookingStatus::Pending);
        assert_eq!(pending.staff_id, Some(ana));

        let f = fixture(BookingConfig {
            auto_confirm: true,
            ..BookingConfig::default()
        })
        .await;
        let ana = staff_available(&f).await;
        let confirmed = f
            .services
            .bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, Some(ana)), customer(7))
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert!(confirmed.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn test_ineligible_staff_is_rejected_before_reserving() {
        let f = fixture(BookingConfig::default()).await;
        let outsider = f.store.add_staff(f.business, "Olek").await;
        let err = f
            .services
            .bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, Some(outsider)), customer(7))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(f.store.slots().await.iter().all(|s| s.booked == 0));
        assert!(f.store.bookings().await.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_ceiling_and_full_slot() {
        let f = fixture(BookingConfig::default()).await;
        let bookings = &f.services.bookings;

        let err = bookings
            .create_booking(request(&f, slot(&f, 9, None), 3, None), customer(7))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_)));

        bookings
            .create_booking(request(&f, slot(&f, 9, None), 2, None), customer(7))
            .await
            .unwrap();
        let err = bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, None), customer(8))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotUnavailable(_)));
        assert_eq!(f.store.bookings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_respects_lead_time() {
        let f = fixture(BookingConfig::default()).await;
        let booking = f
            .services
            .bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, None), customer(7))
            .await
            .unwrap();

        // Ten hours before the 07:00 UTC start
        f.clock.set(Utc.with_ymd_and_hms(2026, 10, 18, 21, 0, 0).unwrap());
        let err = f
            .services
            .bookings
            .cancel_booking(booking.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotCancellable(_)));
        assert_eq!(f.store.slots().await[0].booked, 1);
    }

    #[tokio::test]
    async fn test_double_cancel_does_not_double_release() {
        let f = fixture(BookingConfig::default()).await;
        let bookings = &f.services.bookings;
        bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, None), customer(7))
            .await
            .unwrap();
        let booking = bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, None), customer(8))
            .await
            .unwrap();

        let cancelled = bookings
            .cancel_booking(booking.id, Some("sick".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("sick"));
        assert_eq!(f.store.slots().await[0].booked, 1);

        let err = bookings.cancel_booking(booking.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotCancellable(_)));
        assert_eq!(f.store.slots().await[0].booked, 1);
    }

    #[tokio::test]
    async fn test_reschedule_keeps_staff_when_still_eligible() {
        let f = fixture(BookingConfig::default()).await;
        let ana = staff_available(&f).await;
        let bookings = &f.services.bookings;
        let booking = bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, Some(ana)), customer(7))
            .await
            .unwrap();

        let moved = bookings
            .reschedule_booking(
                booking.id,
                RescheduleBooking {
                    slot_id: slot(&f, 15, None),
                    staff_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.staff_id, Some(ana));
        assert_eq!(moved.status, BookingStatus::Pending);
        assert_eq!(moved.start_time, Utc.with_ymd_and_hms(2026, 10, 19, 13, 0, 0).unwrap());
    }

    async fn narrow_to_morning(f: &Fixture, staff_id: i32) {
        f.services
            .staff
            .set_availability(
                f.business,
                staff_id,
                SetAvailability {
                    date: monday(),
                    windows: vec![AvailabilityWindow {
                        venue_id: None,
                        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                        end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                        status: AvailabilityStatus::Available,
                        notes: None,
                    }],
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reschedule_drops_staff_who_cannot_follow() {
        let f = fixture(BookingConfig::default()).await;
        let ana = staff_available(&f).await;
        narrow_to_morning(&f, ana).await;
        let bookings = &f.services.bookings;
        let booking = bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, Some(ana)), customer(7))
            .await
            .unwrap();

        let moved = bookings
            .reschedule_booking(
                booking.id,
                RescheduleBooking {
                    slot_id: slot(&f, 15, None),
                    staff_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.staff_id, None);
        assert_eq!(moved.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_confirmed_reschedule_refused_without_staff() {
        let f = fixture(BookingConfig {
            auto_confirm: true,
            ..BookingConfig::default()
        })
        .await;
        let ana = staff_available(&f).await;
        narrow_to_morning(&f, ana).await;
        let bookings = &f.services.bookings;
        let booking = bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, Some(ana)), customer(7))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let err = bookings
            .reschedule_booking(
                booking.id,
                RescheduleBooking {
                    slot_id: slot(&f, 15, None),
                    staff_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotReschedulable(_)));

        let kept = bookings.get_booking(booking.id).await.unwrap();
        assert_eq!(kept.time_slot_id, booking.time_slot_id);
        assert_eq!(kept.staff_id, Some(ana));
        assert_eq!(kept.status, BookingStatus::Confirmed);
    }

    /// Catalog whose service roster read fails
    struct RosterOutage(MemoryStore);

    #[async_trait::async_trait]
    impl CatalogStore for RosterOutage {
        async fn ping(&self) -> AppResult<()> {
            self.0.ping().await
        }

        async fn business(&self, business_id: i32) -> AppResult<crate::models::Business> {
            self.0.business(business_id).await
        }

        async fn service(&self, business_id: i32, service_id: i32) -> AppResult<crate::models::Service> {
            self.0.service(business_id, service_id).await
        }

        async fn venue(&self, business_id: i32, venue_id: i32) -> AppResult<crate::models::Venue> {
            self.0.venue(business_id, venue_id).await
        }

        async fn primary_venue(&self, business_id: i32) -> AppResult<crate::models::Venue> {
            self.0.primary_venue(business_id).await
        }

        async fn staff_member(
            &self,
            business_id: i32,
            user_id: i32,
        ) -> AppResult<Option<crate::models::StaffMember>> {
            self.0.staff_member(business_id, user_id).await
        }

        async fn staff_roster(&self, business_id: i32) -> AppResult<Vec<crate::models::StaffMember>> {
            self.0.staff_roster(business_id).await
        }

        async fn service_staff(&self, _service_id: i32, _venue_id: i32) -> AppResult<Vec<i32>> {
            Err(AppError::Internal("roster unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_reschedule_surfaces_roster_failures() {
        let f = fixture(BookingConfig::default()).await;
        let ana = staff_available(&f).await;
        let booking = f
            .services
            .bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, Some(ana)), customer(7))
            .await
            .unwrap();

        let repository = Repository::in_memory(f.store.clone())
            .with_catalog(Arc::new(RosterOutage(f.store.clone())));
        let degraded = Services::new(repository, BookingConfig::default(), f.clock.clone());
        let err = degraded
            .bookings
            .reschedule_booking(
                booking.id,
                RescheduleBooking {
                    slot_id: slot(&f, 15, None),
                    staff_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        let kept = f.services.bookings.get_booking(booking.id).await.unwrap();
        assert_eq!(kept.time_slot_id, booking.time_slot_id);
        assert_eq!(kept.staff_id, Some(ana));
    }

    #[tokio::test]
    async fn test_lifecycle_steps() {
        let f = fixture(BookingConfig::default()).await;
        let ana = staff_available(&f).await;
        let bookings = &f.services.bookings;
        let booking = bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, None), customer(7))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Unassigned);

        let err = bookings.confirm_booking(f.business, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        let assigned = bookings.assign_staff(f.business, booking.id, ana).await.unwrap();
        assert_eq!(assigned.status, BookingStatus::Pending);

        let confirmed = bookings.confirm_booking(f.business, booking.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let err = bookings.archive_booking(f.business, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        let done = bookings.complete_booking(f.business, booking.id).await.unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert!(done.completed_at.is_some());
        // Completion does not free the seat
        assert_eq!(f.store.slots().await[0].booked, 1);

        bookings.archive_booking(f.business, booking.id).await.unwrap();
        assert!(matches!(
            bookings.get_booking(booking.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(bookings.list_customer_bookings(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_business_cannot_touch_booking() {
        let f = fixture(BookingConfig::default()).await;
        let booking = f
            .services
            .bookings
            .create_booking(request(&f, slot(&f, 9, None), 1, None), customer(7))
            .await
            .unwrap();
        let err = f
            .services
            .bookings
            .complete_booking(f.business + 100, booking.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_blocked_slot_refuses_and_unblock_restores() {
        let f = fixture(BookingConfig::default()).await;
        let bookings = &f.services.bookings;
        let token = slot(&f, 11, None);

        let blocked = bookings.set_slot_blocked(f.business, &token, true).await.unwrap();
        assert_eq!(blocked.status, crate::models::SlotStatus::Blocked);

        let err = bookings
            .create_booking(request(&f, token.clone(), 1, None), customer(7))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotUnavailable(_)));

        bookings.set_slot_blocked(f.business, &token, false).await.unwrap();
        bookings
            .create_booking(request(&f, token.clone(), 1, None), customer(7))
            .await
            .unwrap();

        let err = bookings.set_slot_capacity(f.business, &token, 0).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
        let widened = bookings.set_slot_capacity(f.business, &token, 5).await.unwrap();
        assert_eq!((widened.capacity, widened.booked), (5, 1));
    }
}
