//! Slot and date availability endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::{business::StaffMember, time_slot::SlotView},
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SlotQuery {
    /// Business-local date (YYYY-MM-DD)
    #[param(value_type = String)]
    pub date: NaiveDate,
    /// Only slots pinned to this staff member
    pub staff_id: Option<i32>,
    /// Venue; the primary venue when absent
    pub venue_id: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DatesQuery {
    /// Window length in days, capped by the server
    pub days: Option<i64>,
}

/// List the slots of a date with live counters
#[utoipa::path(
    get,
    path = "/businesses/{business_id}/services/{service_id}/slots",
    tag = "availability",
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("service_id" = i32, Path, description = "Service ID"),
        SlotQuery
    ),
    responses(
        (status = 200, description = "Slots of the date", body = Vec<SlotView>),
        (status = 404, description = "Business, service or venue not found")
    )
)]
pub async fn list_slots(
    State(state): State<AppState>,
    Path((business_id, service_id)): Path<(i32, i32)>,
    Query(query): Query<SlotQuery>,
) -> AppResult<Json<Vec<SlotView>>> {
    let slots = state
        .services
        .availability
        .list_available_slots(business_id, service_id, query.date, query.staff_id, query.venue_id)
        .await?;
    Ok(Json(slots))
}

/// List open dates starting today
#[utoipa::path(
    get,
    path = "/businesses/{business_id}/services/{service_id}/dates",
    tag = "availability",
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("service_id" = i32, Path, description = "Service ID"),
        DatesQuery
    ),
    responses(
        (status = 200, description = "Open dates", body = Vec<String>),
        (status = 404, description = "Business or service not found")
    )
)]
pub async fn list_dates(
    State(state): State<AppState>,
    Path((business_id, service_id)): Path<(i32, i32)>,
    Query(query): Query<DatesQuery>,
) -> AppResult<Json<Vec<NaiveDate>>> {
    let dates = state
        .services
        .availability
        .list_available_dates(business_id, service_id, query.days)
        .await?;
    Ok(Json(dates))
}

/// Staff who can serve a slot
#[utoipa::path(
    get,
    path = "/businesses/{business_id}/services/{service_id}/slots/{slot_id}/staff",
    tag = "availability",
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("service_id" = i32, Path, description = "Service ID"),
        ("slot_id" = String, Path, description = "Slot identity token")
    ),
    responses(
        (status = 200, description = "Eligible staff", body = Vec<StaffMember>),
        (status = 400, description = "Malformed slot id"),
        (status = 409, description = "No such slot in the schedule")
    )
)]
pub async fn list_slot_staff(
    State(state): State<AppState>,
    Path((business_id, service_id, slot_id)): Path<(i32, i32, String)>,
) -> AppResult<Json<Vec<StaffMember>>> {
    let staff = state
        .services
        .staff
        .list_eligible_staff(business_id, service_id, &slot_id)
        .await?;
    Ok(Json(staff))
}
