//! In-process implementation of every store
//!
//! All state sits behind one async mutex, so each call is atomic. Mutations
//! are computed on copies and written back only when the whole call
//! succeeds. Faults can be injected to exercise rollback and retry paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{
        booking::{Booking, BookingStatus, NewBooking, Rebinding, Transition},
        business::{Business, Service, StaffMember, Venue},
        staff_availability::{AvailabilityWindow, StaffAvailability},
        time_slot::{SlotDefaults, SlotKey, TimeSlot},
    },
};

use super::{
    time_slots::refused, BookingLedger, CatalogStore, SlotStore, StaffAvailabilityStore,
};

#[derive(Debug, Clone)]
struct ServiceStaff {
    service_id: i32,
    user_id: i32,
    venue_id: Option<i32>,
}

#[derive(Default)]
struct State {
    next_id: i32,
    businesses: BTreeMap<i32, Business>,
    venues: BTreeMap<i32, Venue>,
    services: BTreeMap<i32, Service>,
    roster: Vec<StaffMember>,
    service_staff: Vec<ServiceStaff>,
    slots: BTreeMap<i32, TimeSlot>,
    slot_keys: HashMap<SlotKey, i32>,
    bookings: BTreeMap<i32, Booking>,
    availability: Vec<StaffAvailability>,
    failing_writes: u32,
    contended_calls: u32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_contention(&mut self) -> AppResult<()> {
        if self.contended_calls > 0 {
            self.contended_calls -= 1;
            return Err(AppError::LockContention(
                "time slot row is locked by another transaction".to_string(),
            ));
        }
        Ok(())
    }

    fn check_write(&mut self) -> AppResult<()> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(AppError::Internal("booking write failed".to_string()));
        }
        Ok(())
    }

    fn slot(&self, slot_id: i32) -> AppResult<TimeSlot> {
        self.slots
            .get(&slot_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Time slot with id {} not found", slot_id)))
    }

    fn booking(&self, booking_id: i32) -> AppResult<Booking> {
        self.bookings
            .get(&booking_id)
            .filter(|b| b.deleted_at.is_none())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Booking with id {} not found", booking_id)))
    }
}

/// Shared in-process store; clones see the same state
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- seeding -----------------------------------------------------------

    pub async fn add_business(
        &self,
        name: &str,
        opening_hours: serde_json::Value,
        timezone: &str,
    ) -> i32 {
        let mut st = self.state.lock().await;
        let id = st.next_id();
        st.businesses.insert(
            id,
            Business {
                id,
                name: name.to_string(),
                opening_hours: Some(opening_hours),
                timezone: timezone.to_string(),
            },
        );
        id
    }

    pub async fn add_venue(&self, business_id: i32, name: &str, is_primary: bool) -> i32 {
        let mut st = self.state.lock().await;
        let id = st.next_id();
        st.venues.insert(
            id,
            Venue {
                id,
                business_id,
                name: name.to_string(),
                is_primary,
            },
        );
        id
    }

    pub async fn add_service(
        &self,
        business_id: i32,
        name: &str,
        duration: i32,
        price: Decimal,
        capacity: i32,
    ) -> i32 {
        let mut st = self.state.lock().await;
        let id = st.next_id();
        st.services.insert(
            id,
            Service {
                id,
                business_id,
                name: name.to_string(),
                duration,
                price,
                capacity,
                status: "active".to_string(),
            },
        );
        id
    }

    pub async fn set_service_status(&self, service_id: i32, status: &str) {
        let mut st = self.state.lock().await;
        if let Some(service) = st.services.get_mut(&service_id) {
            service.status = status.to_string();
        }
    }

    /// Add a roster member and return their user id
    pub async fn add_staff(&self, business_id: i32, name: &str) -> i32 {
        let mut st = self.state.lock().await;
        let user_id = st.next_id();
        st.roster.push(StaffMember {
            user_id,
            business_id,
            name: name.to_string(),
            email: None,
            role: "staff".to_string(),
            specialties: Vec::new(),
            experience: None,
            languages: Vec::new(),
        });
        user_id
    }

    /// Authorize a staff member for a service, at one venue or everywhere
    pub async fn allow_service(&self, service_id: i32, user_id: i32, venue_id: Option<i32>) {
        let mut st = self.state.lock().await;
        st.service_staff.push(ServiceStaff {
            service_id,
            user_id,
            venue_id,
        });
    }

    // --- faults ------------------------------------------------------------

    /// Make the next `n` booking writes fail after their seats were computed
    pub async fn fail_booking_writes(&self, n: u32) {
        self.state.lock().await.failing_writes = n;
    }

    /// Make the next `n` locking calls report contention
    pub async fn contend_next(&self, n: u32) {
        self.state.lock().await.contended_calls = n;
    }

    // --- inspection --------------------------------------------------------

    pub async fn slots(&self) -> Vec<TimeSlot> {
        self.state.lock().await.slots.values().cloned().collect()
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.lock().await.bookings.values().cloned().collect()
    }

    async fn update_slot<F>(&self, slot_id: i32, change: F) -> AppResult<TimeSlot>
    where
        F: FnOnce(&mut TimeSlot) -> AppResult<()> + Send,
    {
        let mut st = self.state.lock().await;
        st.check_contention()?;
        let mut slot = st.slot(slot_id)?;
        change(&mut slot)?;
        slot.updated_at = Utc::now();
        st.slots.insert(slot_id, slot.clone());
        Ok(slot)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn business(&self, business_id: i32) -> AppResult<Business> {
        self.state
            .lock()
            .await
            .businesses
            .get(&business_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Business with id {} not found", business_id)))
    }

    async fn service(&self, business_id: i32, service_id: i32) -> AppResult<Service> {
        self.state
            .lock()
            .await
            .services
            .get(&service_id)
            .filter(|s| s.business_id == business_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Service with id {} not found", service_id)))
    }

    async fn venue(&self, business_id: i32, venue_id: i32) -> AppResult<Venue> {
        self.state
            .lock()
            .await
            .venues
            .get(&venue_id)
            .filter(|v| v.business_id == business_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Venue with id {} not found", venue_id)))
    }

    async fn primary_venue(&self, business_id: i32) -> AppResult<Venue> {
        self.state
            .lock()
            .await
            .venues
            .values()
            .find(|v| v.business_id == business_id && v.is_primary)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!("Business {} has no primary venue", business_id))
            })
    }

    async fn staff_member(&self, business_id: i32, user_id: i32) -> AppResult<Option<StaffMember>> {
        Ok(self
            .state
            .lock()
            .await
            .roster
            .iter()
            .find(|m| m.business_id == business_id && m.user_id == user_id)
            .cloned())
    }

    async fn staff_roster(&self, business_id: i32) -> AppResult<Vec<StaffMember>> {
        Ok(self
            .state
            .lock()
            .await
            .roster
            .iter()
            .filter(|m| m.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn service_staff(&self, service_id: i32, venue_id: i32) -> AppResult<Vec<i32>> {
        let st = self.state.lock().await;
        let mut ids: Vec<i32> = st
            .service_staff
            .iter()
            .filter(|s| s.service_id == service_id && s.venue_id.map_or(true, |v| v == venue_id))
            .map(|s| s.user_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

#[async_trait]
impl SlotStore for MemoryStore {
    async fn get(&self, slot_id: i32) -> AppResult<TimeSlot> {
        self.state.lock().await.slot(slot_id)
    }

    async fn find(&self, key: &SlotKey) -> AppResult<Option<TimeSlot>> {
        let st = self.state.lock().await;
        Ok(st.slot_keys.get(key).and_then(|id| st.slots.get(id)).cloned())
    }

    async fn find_for_date(
        &self,
        business_id: i32,
        venue_id: i32,
        service_id: i32,
        date: NaiveDate,
    ) -> AppResult<Vec<TimeSlot>> {
        let st = self.state.lock().await;
        let mut slots: Vec<TimeSlot> = st
            .slots
            .values()
            .filter(|s| {
                s.business_id == business_id
                    && s.venue_id == venue_id
                    && s.service_id == service_id
                    && s.date == date
            })
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.start_time, s.staff_id));
        Ok(slots)
    }

    async fn get_or_create(&self, key: &SlotKey, defaults: &SlotDefaults) -> AppResult<TimeSlot> {
        let mut st = self.state.lock().await;
        if let Some(id) = st.slot_keys.get(key).copied() {
            return st.slot(id);
        }
        let id = st.next_id();
        let slot = TimeSlot::new(id, key, defaults, Utc::now());
        st.slot_keys.insert(key.clone(), id);
        st.slots.insert(id, slot.clone());
        Ok(slot)
    }

    async fn reserve(&self, slot_id: i32, count: i32) -> AppResult<TimeSlot> {
        self.update_slot(slot_id, |slot| {
            slot.reserve(count).map_err(|r| refused(slot, r))
        })
        .await
    }

    async fn release(&self, slot_id: i32, count: i32) -> AppResult<TimeSlot> {
        self.update_slot(slot_id, |slot| {
            slot.release(count);
            Ok(())
        })
        .await
    }

    async fn set_blocked(&self, slot_id: i32, blocked: bool) -> AppResult<TimeSlot> {
        self.update_slot(slot_id, |slot| {
            slot.set_blocked(blocked);
            Ok(())
        })
        .await
    }

    async fn set_capacity(&self, slot_id: i32, capacity: i32) -> AppResult<TimeSlot> {
        self.update_slot(slot_id, |slot| {
            slot.set_capacity(capacity).map_err(AppError::BusinessRule)
        })
        .await
    }
}

#[async_trait]
impl BookingLedger for MemoryStore {
    async fn get(&self, booking_id: i32) -> AppResult<Booking> {
        self.state.lock().await.booking(booking_id)
    }

    async fn list_for_customer(&self, user_id: i32) -> AppResult<Vec<Booking>> {
        let st = self.state.lock().await;
        let mut bookings: Vec<Booking> = st
            .bookings
            .values()
            .filter(|b| b.user_id == user_id && b.deleted_at.is_none())
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    async fn reserve_and_insert(&self, booking: NewBooking, now: DateTime<Utc>) -> AppResult<Booking> {
        let mut st = self.state.lock().await;
        st.check_contention()?;

        let mut slot = st.slot(booking.time_slot_id)?;
        slot.reserve(booking.participants)
            .map_err(|r| refused(&slot, r))?;
        slot.updated_at = now;
        st.check_write()?;

        let id = st.next_id();
        let created = Booking::from_new(id, booking, now);
        st.slots.insert(slot.id, slot);
        st.bookings.insert(id, created.clone());
        Ok(created)
    }

    async fn cancel_and_release(
        &self,
        booking_id: i32,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut st = self.state.lock().await;
        st.check_contention()?;

        let mut booking = st.booking(booking_id)?;
        if !booking.status.is_cancellable() {
            return Err(AppError::NotCancellable(format!(
                "Booking {} is no longer cancellable",
                booking_id
            )));
        }
        let mut slot = st.slot(booking.time_slot_id)?;
        slot.release(booking.participants);
        slot.updated_at = now;

        booking.status = BookingStatus::Cancelled;
        booking.cancellation_reason = reason;
        booking.cancelled_at = Some(now);
        booking.updated_at = now;
        st.check_write()?;

        st.slots.insert(slot.id, slot);
        st.bookings.insert(booking_id, booking.clone());
        Ok(booking)
    }

    async fn move_booking(
        &self,
        booking_id: i32,
        expected_slot_id: i32,
        to: Rebinding,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut st = self.state.lock().await;
        st.check_contention()?;

        let mut booking = st.booking(booking_id)?;
        if !booking.status.is_cancellable() {
            return Err(AppError::NotReschedulable(format!(
                "Booking {} is {}",
                booking_id, booking.status
            )));
        }
        if booking.time_slot_id != expected_slot_id {
            return Err(AppError::Conflict(format!(
                "Booking {} was moved concurrently",
                booking_id
            )));
        }

        let mut touched = Vec::new();
        if to.time_slot_id != booking.time_slot_id {
            let mut new = st.slot(to.time_slot_id)?;
            let mut old = st.slot(booking.time_slot_id)?;
            new.reserve(booking.participants)
                .map_err(|r| refused(&new, r))?;
            old.release(booking.participants);
            new.updated_at = now;
            old.updated_at = now;
            touched.push(new);
            touched.push(old);
        }

        booking.time_slot_id = to.time_slot_id;
        booking.staff_id = to.staff_id;
        booking.start_time = to.start_time;
        booking.end_time = to.end_time;
        booking.updated_at = now;
        st.check_write()?;

        for slot in touched {
            st.slots.insert(slot.id, slot);
        }
        st.bookings.insert(booking_id, booking.clone());
        Ok(booking)
    }

    async fn transition(
        &self,
        booking_id: i32,
        step: Transition,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut st = self.state.lock().await;
        let mut booking = st.booking(booking_id)?;
        if !step.allowed_from().contains(&booking.status) {
            return Err(AppError::BusinessRule(format!(
                "Cannot {} booking {} in status {}",
                step.name(),
                booking_id,
                booking.status
            )));
        }
        step.apply(&mut booking, now);
        st.bookings.insert(booking_id, booking.clone());
        Ok(booking)
    }

    async fn archive(&self, booking_id: i32, now: DateTime<Utc>) -> AppResult<()> {
        let mut st = self.state.lock().await;
        let mut booking = st.booking(booking_id)?;
        if !booking.status.is_terminal() {
            return Err(AppError::BusinessRule(format!(
                "Booking {} is {} and cannot be archived yet",
                booking_id, booking.status
            )));
        }
        booking.deleted_at = Some(now);
        booking.updated_at = now;
        st.bookings.insert(booking_id, booking);
        Ok(())
    }
}

#[async_trait]
impl StaffAvailabilityStore for MemoryStore {
    async fn for_date(&self, business_id: i32, date: NaiveDate) -> AppResult<Vec<StaffAvailability>> {
        let st = self.state.lock().await;
        let mut rows: Vec<StaffAvailability> = st
            .availability
            .iter()
            .filter(|a| a.business_id == business_id && a.date == date)
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.user_id, a.start_time));
        Ok(rows)
    }

    async fn for_staff(
        &self,
        business_id: i32,
        user_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StaffAvailability>> {
        let st = self.state.lock().await;
        let mut rows: Vec<StaffAvailability> = st
            .availability
            .iter()
            .filter(|a| {
                a.business_id == business_id && a.user_id == user_id && a.date >= from && a.date <= to
            })
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.date, a.start_time));
        Ok(rows)
    }

    async fn replace_days(
        &self,
        business_id: i32,
        user_id: i32,
        days: &[(NaiveDate, Vec<AvailabilityWindow>)],
    ) -> AppResult<usize> {
        let mut st = self.state.lock().await;
        let now = Utc::now();
        let mut written = 0;

        for (date, windows) in days {
            st.availability
                .retain(|a| !(a.business_id == business_id && a.user_id == user_id && a.date == *date));
            for window in windows {
                let id = st.next_id();
                st.availability.push(StaffAvailability {
                    id,
                    user_id,
                    business_id,
                    venue_id: window.venue_id,
                    date: *date,
                    start_time: window.start_time,
                    end_time: window.end_time,
                    is_available: window.is_available(),
                    status: window.status,
                    notes: window.notes.clone(),
                    created_at: now,
                    updated_at: now,
                });
                written += 1;
            }
        }
        Ok(written)
    }
}
