//! End-to-end booking engine properties over the in-process store

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use slotwise_server::{
    config::BookingConfig,
    error::AppError,
    models::{
        booking::{CreateBooking, CustomerDetails, RescheduleBooking},
        BookingStatus, SlotKey,
    },
    repository::{memory::MemoryStore, Repository},
    services::{bookings::Customer, clock::FixedClock, Services},
};

struct Engine {
    store: MemoryStore,
    services: Services,
    clock: Arc<FixedClock>,
    business: i32,
    venue: i32,
    service: i32,
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

async fn engine(capacity: i32) -> Engine {
    engine_with(capacity, BookingConfig::default()).await
}

async fn engine_with(capacity: i32, config: BookingConfig) -> Engine {
    let store = MemoryStore::new();
    let business = store
        .add_business(
            "Climbing Gym",
            json!({
                "monday": {"is_open": true, "start": "09:00", "end": "17:00"},
                "saturday": {"is_open": true, "start": "22:00", "end": "02:00"}
            }),
            "UTC",
        )
        .await;
    let venue = store.add_venue(business, "Hall", true).await;
    let service = store
        .add_service(business, "Bouldering", 60, Decimal::new(3000, 2), capacity)
        .await;
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap(),
    ));
    let config = BookingConfig {
        lock_retry_base_delay_ms: 1,
        ..config
    };
    let services = Services::new(Repository::in_memory(store.clone()), config, clock.clone());

    Engine {
        store,
        services,
        clock,
        business,
        venue,
        service,
    }
}

impl Engine {
    fn slot(&self, date: NaiveDate, hour: u32) -> String {
        SlotKey {
            business_id: self.business,
            venue_id: self.venue,
            service_id: self.service,
            staff_id: None,
            date,
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        }
        .token()
    }

    fn request(&self, slot_id: String, participants: i32) -> CreateBooking {
        CreateBooking {
            business_id: self.business,
            service_id: self.service,
            slot_id,
            staff_id: None,
            participants,
            notes: None,
        }
    }

    /// Sum of active participants per slot equals each slot's `booked`
    async fn assert_conserved(&self) {
        let bookings = self.store.bookings().await;
        for slot in self.store.slots().await {
            let active: i32 = bookings
                .iter()
                .filter(|b| b.time_slot_id == slot.id && b.status != BookingStatus::Cancelled)
                .map(|b| b.participants)
                .sum();
            assert_eq!(slot.booked, active, "slot {} drifted", slot.id);
            assert!(slot.booked <= slot.capacity);
        }
    }
}

fn customer(user_id: i32) -> Customer {
    Customer {
        user_id,
        details: CustomerDetails {
            name: format!("Customer {}", user_id),
            email: None,
            phone: None,
        },
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_never_oversell() {
    let engine = Arc::new(engine(3).await);
    let slot_id = engine.slot(monday(), 10);

    let mut handles = Vec::new();
    for user in 0..12 {
        let engine = engine.clone();
        let slot_id = slot_id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .services
                .bookings
                .create_booking(engine.request(slot_id, 1), customer(100 + user))
                .await
        }));
    }

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(AppError::SlotUnavailable(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(won, 3);
    let slots = engine.store.slots().await;
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].booked, 3);
    engine.assert_conserved().await;
}

#[tokio::test]
async fn cancel_and_reschedule_conserve_seats() {
    let engine = engine(4).await;
    let bookings = &engine.services.bookings;

    let a = bookings
        .create_booking(engine.request(engine.slot(monday(), 9), 2), customer(1))
        .await
        .unwrap();
    let b = bookings
        .create_booking(engine.request(engine.slot(monday(), 9), 1), customer(2))
        .await
        .unwrap();
    bookings
        .create_booking(engine.request(engine.slot(monday(), 11), 3), customer(3))
        .await
        .unwrap();
    engine.assert_conserved().await;

    bookings.cancel_booking(b.id, None).await.unwrap();
    engine.assert_conserved().await;

    let moved = bookings
        .reschedule_booking(
            a.id,
            RescheduleBooking {
                slot_id: engine.slot(monday(), 14),
                staff_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.status, a.status);
    engine.assert_conserved().await;

    // Not enough room at 11:00 (3 of 4 taken) for the two participants
    let err = bookings
        .reschedule_booking(
            a.id,
            RescheduleBooking {
                slot_id: engine.slot(monday(), 11),
                staff_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlotUnavailable(_)));
    assert_eq!(bookings.get_booking(a.id).await.unwrap().time_slot_id, moved.time_slot_id);
    engine.assert_conserved().await;
}

#[tokio::test]
async fn lead_time_guards_cancel_and_reschedule() {
    let engine = engine(2).await;
    let bookings = &engine.services.bookings;
    let booking = bookings
        .create_booking(engine.request(engine.slot(monday(), 9), 1), customer(1))
        .await
        .unwrap();

    // Twelve hours before the start, inside the 24 hour lead time
    engine
        .clock
        .set(Utc.with_ymd_and_hms(2026, 10, 18, 21, 0, 0).unwrap());

    assert!(matches!(
        bookings.cancel_booking(booking.id, None).await,
        Err(AppError::NotCancellable(_))
    ));
    assert!(matches!(
        bookings
            .reschedule_booking(
                booking.id,
                RescheduleBooking {
                    slot_id: engine.slot(monday(), 15),
                    staff_id: None,
                },
            )
            .await,
        Err(AppError::NotReschedulable(_))
    ));

    // Without a lead time only a future start is required
    let relaxed = engine_with(
        2,
        BookingConfig {
            cancellation_lead_hours: 0,
            ..BookingConfig::default()
        },
    )
    .await;
    let booking = relaxed
        .services
        .bookings
        .create_booking(relaxed.request(relaxed.slot(monday(), 9), 1), customer(1))
        .await
        .unwrap();
    relaxed
        .clock
        .set(Utc.with_ymd_and_hms(2026, 10, 19, 8, 59, 0).unwrap());
    relaxed
        .services
        .bookings
        .cancel_booking(booking.id, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_booking_write_leaves_no_trace() {
    let engine = engine(2).await;
    engine.store.fail_booking_writes(1).await;

    let err = engine
        .services
        .bookings
        .create_booking(engine.request(engine.slot(monday(), 9), 2), customer(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert!(engine.store.bookings().await.is_empty());
    assert!(engine.store.slots().await.iter().all(|s| s.booked == 0));

    // The slot is whole again for the next caller
    engine
        .services
        .bookings
        .create_booking(engine.request(engine.slot(monday(), 9), 2), customer(2))
        .await
        .unwrap();
    engine.assert_conserved().await;
}

#[tokio::test]
async fn lock_contention_is_retried_then_reported() {
    let engine = engine(2).await;
    let bookings = &engine.services.bookings;

    // Two contended attempts fit in the default budget of three
    engine.store.contend_next(2).await;
    bookings
        .create_booking(engine.request(engine.slot(monday(), 9), 1), customer(1))
        .await
        .unwrap();

    engine.store.contend_next(3).await;
    let err = bookings
        .create_booking(engine.request(engine.slot(monday(), 10), 1), customer(2))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::LockContention(_)));
    assert_eq!(engine.store.bookings().await.len(), 1);
    engine.assert_conserved().await;
}

#[tokio::test]
async fn overnight_slots_are_bookable_on_the_next_date() {
    let engine = engine(1).await;
    let saturday = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

    let slots = engine
        .services
        .availability
        .list_available_slots(engine.business, engine.service, saturday, None, None)
        .await
        .unwrap();
    assert_eq!(slots.len(), 4);
    let after_midnight = &slots[2];
    assert_eq!(after_midnight.date, saturday + Duration::days(1));

    let booking = engine
        .services
        .bookings
        .create_booking(engine.request(after_midnight.slot_id.clone(), 1), customer(1))
        .await
        .unwrap();
    assert_eq!(
        booking.start_time,
        Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn unknown_slot_tokens_are_rejected() {
    let engine = engine(2).await;
    let bookings = &engine.services.bookings;

    let err = bookings
        .create_booking(engine.request("not-a-slot".into(), 1), customer(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Tuesday is closed
    let err = bookings
        .create_booking(
            engine.request(engine.slot(monday() + Duration::days(1), 9), 1),
            customer(1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlotUnavailable(_)));
    assert!(engine.store.slots().await.is_empty());
}
