//! Catalog repository: businesses, venues, services and staff roster

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::business::{Business, Service, StaffMember, Venue},
};

use super::CatalogStore;

#[derive(Clone)]
pub struct CatalogRepository {
    pool: Pool<Postgres>,
}

impl CatalogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const STAFF_COLUMNS: &str = r#"
    SELECT bs.user_id, bs.business_id, u.name, u.email, bs.role,
           bs.specialties, bs.experience, bs.languages
    FROM business_staff bs
    JOIN users u ON u.id = bs.user_id
"#;

#[async_trait]
impl CatalogStore for CatalogRepository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn business(&self, business_id: i32) -> AppResult<Business> {
        sqlx::query_as::<_, Business>(
            r#"
            SELECT id, name, opening_hours, timezone
            FROM businesses
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Business with id {} not found", business_id)))
    }

    async fn service(&self, business_id: i32, service_id: i32) -> AppResult<Service> {
        sqlx::query_as::<_, Service>(
            r#"
            SELECT id, business_id, name, duration, price, capacity, status
            FROM services
            WHERE id = $1 AND business_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(service_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service with id {} not found", service_id)))
    }

    async fn venue(&self, business_id: i32, venue_id: i32) -> AppResult<Venue> {
        sqlx::query_as::<_, Venue>(
            r#"
            SELECT id, business_id, name, is_primary
            FROM venues
            WHERE id = $1 AND business_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(venue_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Venue with id {} not found", venue_id)))
    }

    async fn primary_venue(&self, business_id: i32) -> AppResult<Venue> {
        sqlx::query_as::<_, Venue>(
            r#"
            SELECT id, business_id, name, is_primary
            FROM venues
            WHERE business_id = $1 AND is_primary AND deleted_at IS NULL
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Business {} has no primary venue", business_id))
        })
    }

    async fn staff_member(&self, business_id: i32, user_id: i32) -> AppResult<Option<StaffMember>> {
        let member = sqlx::query_as::<_, StaffMember>(&format!(
            "{} WHERE bs.business_id = $1 AND bs.user_id = $2 AND bs.status = 'active'",
            STAFF_COLUMNS
        ))
        .bind(business_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    async fn staff_roster(&self, business_id: i32) -> AppResult<Vec<StaffMember>> {
        let roster = sqlx::query_as::<_, StaffMember>(&format!(
            "{} WHERE bs.business_id = $1 AND bs.status = 'active' ORDER BY bs.user_id",
            STAFF_COLUMNS
        ))
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roster)
    }

    async fn service_staff(&self, service_id: i32, venue_id: i32) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT user_id
            FROM service_staff
            WHERE service_id = $1 AND status = 'active'
              AND (venue_id IS NULL OR venue_id = $2)
            ORDER BY user_id
            "#,
        )
        .bind(service_id)
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
