//! Staff availability repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::staff_availability::{AvailabilityWindow, StaffAvailability},
};

use super::StaffAvailabilityStore;

#[derive(Clone)]
pub struct StaffAvailabilityRepository {
    pool: Pool<Postgres>,
}

impl StaffAvailabilityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StaffAvailabilityStore for StaffAvailabilityRepository {
    async fn for_date(&self, business_id: i32, date: NaiveDate) -> AppResult<Vec<StaffAvailability>> {
        let rows = sqlx::query_as::<_, StaffAvailability>(
            r#"
            SELECT * FROM staff_availabilities
            WHERE business_id = $1 AND date = $2
            ORDER BY user_id, start_time
            "#,
        )
        .bind(business_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn for_staff(
        &self,
        business_id: i32,
        user_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StaffAvailability>> {
        let rows = sqlx::query_as::<_, StaffAvailability>(
            r#"
            SELECT * FROM staff_availabilities
            WHERE business_id = $1 AND user_id = $2 AND date BETWEEN $3 AND $4
            ORDER BY date, start_time
            "#,
        )
        .bind(business_id)
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn replace_days(
        &self,
        business_id: i32,
        user_id: i32,
        days: &[(NaiveDate, Vec<AvailabilityWindow>)],
    ) -> AppResult<usize> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for (date, windows) in days {
            sqlx::query(
                "DELETE FROM staff_availabilities WHERE business_id = $1 AND user_id = $2 AND date = $3",
            )
            .bind(business_id)
            .bind(user_id)
            .bind(date)
            .execute(&mut *tx)
            .await?;

            for window in windows {
                sqlx::query(
                    r#"
                    INSERT INTO staff_availabilities
                        (user_id, business_id, venue_id, date, start_time, end_time, is_available, status, notes)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(user_id)
                .bind(business_id)
                .bind(window.venue_id)
                .bind(date)
                .bind(window.start_time)
                .bind(window.end_time)
                .bind(window.is_available())
                .bind(window.status)
                .bind(&window.notes)
                .execute(&mut *tx)
                .await?;
                written += 1;
            }
        }

        tx.commit().await?;
        Ok(written)
    }
}
