//! Staff availability endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::AppResult,
    models::staff_availability::{
        BulkAvailability, SetAvailability, StaffAvailability, SyncAvailability, SyncReport,
    },
    AppState,
};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    /// First date (YYYY-MM-DD)
    #[param(value_type = String)]
    pub from: NaiveDate,
    /// Last date, inclusive (YYYY-MM-DD)
    #[param(value_type = String)]
    pub to: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAvailabilityResponse {
    /// Windows written
    pub written: usize,
}

/// A staff member's windows over a date range
#[utoipa::path(
    get,
    path = "/businesses/{business_id}/staff/{user_id}/availability",
    tag = "staff",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("user_id" = i32, Path, description = "Staff member user ID"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Availability windows", body = Vec<StaffAvailability>),
        (status = 404, description = "Not a staff member of the business")
    )
)]
pub async fn get_availability(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, user_id)): Path<(i32, i32)>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<Vec<StaffAvailability>>> {
    claims.require_business(business_id)?;
    let windows = state
        .services
        .staff
        .get_availability(business_id, user_id, query.from, query.to)
        .await?;
    Ok(Json(windows))
}

/// Replace a date's windows
#[utoipa::path(
    put,
    path = "/businesses/{business_id}/staff/{user_id}/availability",
    tag = "staff",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("user_id" = i32, Path, description = "Staff member user ID")
    ),
    request_body = SetAvailability,
    responses(
        (status = 200, description = "Windows stored for the date", body = Vec<StaffAvailability>),
        (status = 400, description = "Invalid windows")
    )
)]
pub async fn set_availability(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, user_id)): Path<(i32, i32)>,
    Json(request): Json<SetAvailability>,
) -> AppResult<Json<Vec<StaffAvailability>>> {
    claims.require_business(business_id)?;
    request.validate()?;
    let windows = state
        .services
        .staff
        .set_availability(business_id, user_id, request)
        .await?;
    Ok(Json(windows))
}

/// Write one window on many dates
#[utoipa::path(
    post,
    path = "/businesses/{business_id}/staff/{user_id}/availability/bulk",
    tag = "staff",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("user_id" = i32, Path, description = "Staff member user ID")
    ),
    request_body = BulkAvailability,
    responses(
        (status = 200, description = "Windows written", body = BulkAvailabilityResponse),
        (status = 400, description = "Invalid window")
    )
)]
pub async fn bulk_set_availability(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, user_id)): Path<(i32, i32)>,
    Json(request): Json<BulkAvailability>,
) -> AppResult<Json<BulkAvailabilityResponse>> {
    claims.require_business(business_id)?;
    request.validate()?;
    let written = state
        .services
        .staff
        .bulk_set_availability(business_id, user_id, request)
        .await?;
    Ok(Json(BulkAvailabilityResponse { written }))
}

/// Mirror opening hours into staff availability
#[utoipa::path(
    post,
    path = "/businesses/{business_id}/staff/availability/sync",
    tag = "staff",
    security(("bearer_auth" = [])),
    params(("business_id" = i32, Path, description = "Business ID")),
    request_body = SyncAvailability,
    responses(
        (status = 200, description = "Sync summary", body = SyncReport)
    )
)]
pub async fn sync_availability(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(business_id): Path<i32>,
    Json(request): Json<SyncAvailability>,
) -> AppResult<Json<SyncReport>> {
    claims.require_business(business_id)?;
    request.validate()?;
    let report = state
        .services
        .staff
        .sync_availability(business_id, request)
        .await?;
    Ok(Json(report))
}
