//! Bookings repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::booking::{Booking, BookingStatus, NewBooking, Rebinding, Transition},
};

use super::{
    time_slots::{lock_slot, refused, set_lock_timeout, store_counters},
    BookingLedger,
};

#[derive(Clone)]
pub struct BookingsRepository {
    pool: Pool<Postgres>,
    lock_timeout_ms: u64,
}

impl BookingsRepository {
    pub fn new(pool: Pool<Postgres>, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }
}

async fn lock_booking(conn: &mut PgConnection, booking_id: i32) -> AppResult<Booking> {
    sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(booking_id)
    .fetch_optional(conn)
    .await
    .map_err(AppError::from_storage)?
    .ok_or_else(|| AppError::NotFound(format!("Booking with id {} not found", booking_id)))
}

fn status_names(statuses: &[BookingStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl BookingLedger for BookingsRepository {
    async fn get(&self, booking_id: i32) -> AppResult<Booking> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 AND deleted_at IS NULL")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking with id {} not found", booking_id)))
    }

    async fn list_for_customer(&self, user_id: i32) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY start_time DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn reserve_and_insert(&self, booking: NewBooking, now: DateTime<Utc>) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_storage)?;
        set_lock_timeout(&mut tx, self.lock_timeout_ms).await?;

        let mut slot = lock_slot(&mut tx, booking.time_slot_id).await?;
        if let Err(refusal) = slot.reserve(booking.participants) {
            // Dropping the transaction rolls it back
            return Err(refused(&slot, refusal));
        }
        store_counters(&mut tx, &slot).await?;

        let confirmed_at = (booking.status == BookingStatus::Confirmed).then_some(now);

        let created = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                user_id, business_id, venue_id, service_id, staff_id, time_slot_id,
                start_time, end_time, participants, total_price, status, payment_status,
                customer_details, service_details, notes, confirmed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', $12, $13, $14, $15, $16, $16)
            RETURNING *
            "#,
        )
        .bind(booking.user_id)
        .bind(booking.business_id)
        .bind(booking.venue_id)
        .bind(booking.service_id)
        .bind(booking.staff_id)
        .bind(booking.time_slot_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.participants)
        .bind(booking.total_price)
        .bind(booking.status)
        .bind(Json(&booking.customer_details))
        .bind(Json(&booking.service_details))
        .bind(&booking.notes)
        .bind(confirmed_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from_storage)?;

        tx.commit().await.map_err(AppError::from_storage)?;
        Ok(created)
    }

    async fn cancel_and_release(
        &self,
        booking_id: i32,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_storage)?;
        set_lock_timeout(&mut tx, self.lock_timeout_ms).await?;

        let cancelled = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = 'cancelled', cancellation_reason = $2, cancelled_at = $3, updated_at = $3
            WHERE id = $1 AND deleted_at IS NULL AND status = ANY($4)
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(&reason)
        .bind(now)
        .bind(status_names(&BookingStatus::CANCELLABLE))
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from_storage)?
        .ok_or_else(|| {
            AppError::NotCancellable(format!("Booking {} is no longer cancellable", booking_id))
        })?;

        let mut slot = lock_slot(&mut tx, cancelled.time_slot_id).await?;
        slot.release(cancelled.participants);
        store_counters(&mut tx, &slot).await?;

        tx.commit().await.map_err(AppError::from_storage)?;
        Ok(cancelled)
    }

    async fn move_booking(
        &self,
        booking_id: i32,
        expected_slot_id: i32,
        to: Rebinding,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_storage)?;
        set_lock_timeout(&mut tx, self.lock_timeout_ms).await?;

        let booking = lock_booking(&mut tx, booking_id).await?;
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

        if to.time_slot_id != booking.time_slot_id {
            // Lock in id order so two opposite moves cannot deadlock
            let old_id = booking.time_slot_id;
            let (first, second) = if old_id < to.time_slot_id {
                (old_id, to.time_slot_id)
            } else {
                (to.time_slot_id, old_id)
            };
            let a = lock_slot(&mut tx, first).await?;
            let b = lock_slot(&mut tx, second).await?;
            let (mut old, mut new) = if a.id == old_id { (a, b) } else { (b, a) };

            if let Err(refusal) = new.reserve(booking.participants) {
                return Err(refused(&new, refusal));
            }
            old.release(booking.participants);
            store_counters(&mut tx, &new).await?;
            store_counters(&mut tx, &old).await?;
        }

        let moved = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET time_slot_id = $2, staff_id = $3, start_time = $4, end_time = $5, updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(to.time_slot_id)
        .bind(to.staff_id)
        .bind(to.start_time)
        .bind(to.end_time)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from_storage)?;

        tx.commit().await.map_err(AppError::from_storage)?;
        Ok(moved)
    }

    async fn transition(
        &self,
        booking_id: i32,
        step: Transition,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let staff_id = match step {
            Transition::AssignStaff(id) => Some(id),
            _ => None,
        };

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2,
                staff_id = COALESCE($3, staff_id),
                confirmed_at = CASE WHEN $2 = 'confirmed' THEN $4 ELSE confirmed_at END,
                completed_at = CASE WHEN $2 = 'completed' THEN $4 ELSE completed_at END,
                updated_at = $4
            WHERE id = $1 AND deleted_at IS NULL AND status = ANY($5)
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(step.target())
        .bind(staff_id)
        .bind(now)
        .bind(status_names(step.allowed_from()))
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(booking) => Ok(booking),
            None => {
                let current = self.get(booking_id).await?;
                Err(AppError::BusinessRule(format!(
                    "Cannot {} booking {} in status {}",
                    step.name(),
                    booking_id,
                    current.status
                )))
            }
        }
    }

    async fn archive(&self, booking_id: i32, now: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET deleted_at = $2, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
              AND status IN ('completed', 'cancelled', 'no-show')
            "#,
        )
        .bind(booking_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get(booking_id).await?;
            return Err(AppError::BusinessRule(format!(
                "Booking {} is {} and cannot be archived yet",
                booking_id, current.status
            )));
        }
        Ok(())
    }
}
