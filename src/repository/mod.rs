//! Repository layer: storage seams of the booking engine
//!
//! Each concern is a trait so the services can run against PostgreSQL in
//! production and against the in-process `memory::MemoryStore` in tests
//! (`testing` feature).

pub mod bookings;
pub mod catalog;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod staff_availability;
pub mod time_slots;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        booking::{Booking, NewBooking, Rebinding, Transition},
        business::{Business, Service, StaffMember, Venue},
        staff_availability::{AvailabilityWindow, StaffAvailability},
        time_slot::{SlotDefaults, SlotKey, TimeSlot},
    },
};

/// Read access to businesses, venues, services and the staff roster
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Storage round trip used by readiness checks
    async fn ping(&self) -> AppResult<()>;

    async fn business(&self, business_id: i32) -> AppResult<Business>;

    /// Active or inactive service of the business
    async fn service(&self, business_id: i32, service_id: i32) -> AppResult<Service>;

    async fn venue(&self, business_id: i32, venue_id: i32) -> AppResult<Venue>;

    async fn primary_venue(&self, business_id: i32) -> AppResult<Venue>;

    async fn staff_member(&self, business_id: i32, user_id: i32) -> AppResult<Option<StaffMember>>;

    async fn staff_roster(&self, business_id: i32) -> AppResult<Vec<StaffMember>>;

    /// Staff authorized for the service, at the venue or at every venue
    async fn service_staff(&self, service_id: i32, venue_id: i32) -> AppResult<Vec<i32>>;
}

/// The capacity ledger
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn get(&self, slot_id: i32) -> AppResult<TimeSlot>;

    async fn find(&self, key: &SlotKey) -> AppResult<Option<TimeSlot>>;

    /// Every persisted slot of a service at a venue starting on `date`, any staff
    async fn find_for_date(
        &self,
        business_id: i32,
        venue_id: i32,
        service_id: i32,
        date: NaiveDate,
    ) -> AppResult<Vec<TimeSlot>>;

    /// Return the row for `key`, inserting it with `defaults` when absent
    async fn get_or_create(&self, key: &SlotKey, defaults: &SlotDefaults) -> AppResult<TimeSlot>;

    /// Take seats; refusal is `SlotUnavailable` and leaves the row untouched
    async fn reserve(&self, slot_id: i32, count: i32) -> AppResult<TimeSlot>;

    /// Give seats back, never below zero
    async fn release(&self, slot_id: i32, count: i32) -> AppResult<TimeSlot>;

    async fn set_blocked(&self, slot_id: i32, blocked: bool) -> AppResult<TimeSlot>;

    async fn set_capacity(&self, slot_id: i32, capacity: i32) -> AppResult<TimeSlot>;
}

/// Booking rows together with the slot counters they hold
///
/// Every method that moves seats does so in the same atomic unit as the
/// booking write: both persist or neither does.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn get(&self, booking_id: i32) -> AppResult<Booking>;

    /// Bookings of a customer, most recent start first, archived rows excluded
    async fn list_for_customer(&self, user_id: i32) -> AppResult<Vec<Booking>>;

    /// Reserve `booking.participants` seats on the slot and insert the row
    async fn reserve_and_insert(&self, booking: NewBooking, now: DateTime<Utc>) -> AppResult<Booking>;

    /// Cancel a booking that is still cancellable and release its seats
    async fn cancel_and_release(
        &self,
        booking_id: i32,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Booking>;

    /// Reserve on the new slot, release the old one, rebind the booking
    ///
    /// `expected_slot_id` guards against a concurrent move of the same booking.
    async fn move_booking(
        &self,
        booking_id: i32,
        expected_slot_id: i32,
        to: Rebinding,
        now: DateTime<Utc>,
    ) -> AppResult<Booking>;

    /// Status-guarded lifecycle step; seats are not touched
    async fn transition(
        &self,
        booking_id: i32,
        step: Transition,
        now: DateTime<Utc>,
    ) -> AppResult<Booking>;

    /// Soft delete a booking in a terminal state
    async fn archive(&self, booking_id: i32, now: DateTime<Utc>) -> AppResult<()>;
}

/// Staff working windows
#[async_trait]
pub trait StaffAvailabilityStore: Send + Sync {
    async fn for_date(&self, business_id: i32, date: NaiveDate) -> AppResult<Vec<StaffAvailability>>;

    async fn for_staff(
        &self,
        business_id: i32,
        user_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StaffAvailability>>;

    /// Replace the windows of each listed date in one atomic unit
    async fn replace_days(
        &self,
        business_id: i32,
        user_id: i32,
        days: &[(NaiveDate, Vec<AvailabilityWindow>)],
    ) -> AppResult<usize>;
}

/// Main repository struct holding every store
#[derive(Clone)]
pub struct Repository {
    pub catalog: Arc<dyn CatalogStore>,
    pub slots: Arc<dyn SlotStore>,
    pub bookings: Arc<dyn BookingLedger>,
    pub staff_availability: Arc<dyn StaffAvailabilityStore>,
}

impl Repository {
    /// PostgreSQL stores sharing one pool
    pub fn postgres(pool: Pool<Postgres>, lock_timeout_ms: u64) -> Self {
        Self {
            catalog: Arc::new(catalog::CatalogRepository::new(pool.clone())),
            slots: Arc::new(time_slots::TimeSlotsRepository::new(pool.clone(), lock_timeout_ms)),
            bookings: Arc::new(bookings::BookingsRepository::new(pool.clone(), lock_timeout_ms)),
            staff_availability: Arc::new(staff_availability::StaffAvailabilityRepository::new(pool)),
        }
    }

    /// In-process stores sharing one state
    #[cfg(any(test, feature = "testing"))]
    pub fn in_memory(store: memory::MemoryStore) -> Self {
        Self {
            catalog: Arc::new(store.clone()),
            slots: Arc::new(store.clone()),
            bookings: Arc::new(store.clone()),
            staff_availability: Arc::new(store),
        }
    }

    /// Same stores with a different catalog
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = catalog;
        self
    }
}
