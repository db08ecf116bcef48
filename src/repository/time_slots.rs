//! Time slots repository for database operations

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult},
    models::time_slot::{Refusal, SlotDefaults, SlotKey, TimeSlot},
};

use super::SlotStore;

#[derive(Clone)]
pub struct TimeSlotsRepository {
    pool: Pool<Postgres>,
    lock_timeout_ms: u64,
}

impl TimeSlotsRepository {
    pub fn new(pool: Pool<Postgres>, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }

    /// Lock one row, apply `change`, write it back, all in one transaction
    async fn update_locked<F>(&self, slot_id: i32, change: F) -> AppResult<TimeSlot>
    where
        F: FnOnce(&mut TimeSlot) -> AppResult<()> + Send,
    {
        let mut tx = self.pool.begin().await.map_err(AppError::from_storage)?;
        set_lock_timeout(&mut tx, self.lock_timeout_ms).await?;

        let mut slot = lock_slot(&mut tx, slot_id).await?;
        change(&mut slot)?;
        let slot = store_counters(&mut tx, &slot).await?;

        tx.commit().await.map_err(AppError::from_storage)?;
        Ok(slot)
    }
}

/// Bound how long this transaction may wait on a row lock
pub(crate) async fn set_lock_timeout(conn: &mut PgConnection, ms: u64) -> AppResult<()> {
    // SET does not take bind parameters
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", ms))
        .execute(conn)
        .await
        .map_err(AppError::from_storage)?;
    Ok(())
}

pub(crate) async fn lock_slot(conn: &mut PgConnection, slot_id: i32) -> AppResult<TimeSlot> {
    sqlx::query_as::<_, TimeSlot>("SELECT * FROM time_slots WHERE id = $1 FOR UPDATE")
        .bind(slot_id)
        .fetch_optional(conn)
        .await
        .map_err(AppError::from_storage)?
        .ok_or_else(|| AppError::NotFound(format!("Time slot with id {} not found", slot_id)))
}

pub(crate) async fn store_counters(conn: &mut PgConnection, slot: &TimeSlot) -> AppResult<TimeSlot> {
    sqlx::query_as::<_, TimeSlot>(
        r#"
        UPDATE time_slots
        SET capacity = $2, booked = $3, status = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(slot.id)
    .bind(slot.capacity)
    .bind(slot.booked)
    .bind(slot.status)
    .fetch_one(conn)
    .await
    .map_err(AppError::from_storage)
}

pub(crate) fn refused(slot: &TimeSlot, refusal: Refusal) -> AppError {
    AppError::SlotUnavailable(format!(
        "Slot {} cannot take the booking: {}",
        slot.key(),
        refusal
    ))
}

const SELECT_BY_KEY: &str = r#"
    SELECT * FROM time_slots
    WHERE business_id = $1 AND venue_id = $2 AND service_id = $3
      AND staff_id IS NOT DISTINCT FROM $4
      AND date = $5 AND start_time = $6
"#;

#[async_trait]
impl SlotStore for TimeSlotsRepository {
    async fn get(&self, slot_id: i32) -> AppResult<TimeSlot> {
        sqlx::query_as::<_, TimeSlot>("SELECT * FROM time_slots WHERE id = $1")
            .bind(slot_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Time slot with id {} not found", slot_id)))
    }

    async fn find(&self, key: &SlotKey) -> AppResult<Option<TimeSlot>> {
        let slot = sqlx::query_as::<_, TimeSlot>(SELECT_BY_KEY)
            .bind(key.business_id)
            .bind(key.venue_id)
            .bind(key.service_id)
            .bind(key.staff_id)
            .bind(key.date)
            .bind(key.start_time)
            .fetch_optional(&self.pool)
            .await?;

        Ok(slot)
    }

    async fn find_for_date(
        &self,
        business_id: i32,
        venue_id: i32,
        service_id: i32,
        date: NaiveDate,
    ) -> AppResult<Vec<TimeSlot>> {
        let slots = sqlx::query_as::<_, TimeSlot>(
            r#"
            SELECT * FROM time_slots
            WHERE business_id = $1 AND venue_id = $2 AND service_id = $3 AND date = $4
            ORDER BY start_time, staff_id NULLS FIRST
            "#,
        )
        .bind(business_id)
        .bind(venue_id)
        .bind(service_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }

    async fn get_or_create(&self, key: &SlotKey, defaults: &SlotDefaults) -> AppResult<TimeSlot> {
        // Concurrent callers race on the unique key; the loser reads the winner's row
        let inserted = sqlx::query_as::<_, TimeSlot>(
            r#"
            INSERT INTO time_slots
                (business_id, venue_id, service_id, staff_id, date, start_time, end_time, capacity, booked, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, 'available')
            ON CONFLICT (business_id, venue_id, service_id, (COALESCE(staff_id, 0)), date, start_time)
            DO NOTHING
            RETURNING *
            "#,
        )
        .bind(key.business_id)
        .bind(key.venue_id)
        .bind(key.service_id)
        .bind(key.staff_id)
        .bind(key.date)
        .bind(key.start_time)
        .bind(defaults.end_time)
        .bind(defaults.capacity)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_storage)?;

        if let Some(slot) = inserted {
            tracing::debug!(slot = %key, id = slot.id, "Materialized time slot");
            return Ok(slot);
        }

        self.find(key)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Time slot {} vanished after upsert", key)))
    }

    async fn reserve(&self, slot_id: i32, count: i32) -> AppResult<TimeSlot> {
        self.update_locked(slot_id, |slot| {
            slot.reserve(count).map_err(|r| refused(slot, r))
        })
        .await
    }

    async fn release(&self, slot_id: i32, count: i32) -> AppResult<TimeSlot> {
        self.update_locked(slot_id, |slot| {
            slot.release(count);
            Ok(())
        })
        .await
    }

    async fn set_blocked(&self, slot_id: i32, blocked: bool) -> AppResult<TimeSlot> {
        self.update_locked(slot_id, |slot| {
            slot.set_blocked(blocked);
            Ok(())
        })
        .await
    }

    async fn set_capacity(&self, slot_id: i32, capacity: i32) -> AppResult<TimeSlot> {
        self.update_locked(slot_id, |slot| {
            slot.set_capacity(capacity).map_err(AppError::BusinessRule)
        })
        .await
    }
}
