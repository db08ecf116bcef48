//! Slot administration endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::AppResult,
    models::time_slot::{TimeSlot, UpdateSlotCapacity},
    AppState,
};

use super::AuthenticatedUser;

/// Block a slot against new reservations
#[utoipa::path(
    put,
    path = "/businesses/{business_id}/slots/{slot_id}/block",
    tag = "slots",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("slot_id" = String, Path, description = "Slot identity token")
    ),
    responses(
        (status = 200, description = "Slot blocked", body = TimeSlot),
        (status = 403, description = "Not a member of the business")
    )
)]
pub async fn block_slot(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, slot_id)): Path<(i32, String)>,
) -> AppResult<Json<TimeSlot>> {
    claims.require_business(business_id)?;
    let slot = state
        .services
        .bookings
        .set_slot_blocked(business_id, &slot_id, true)
        .await?;
    Ok(Json(slot))
}

/// Lift a block; status follows the counters again
#[utoipa::path(
    delete,
    path = "/businesses/{business_id}/slots/{slot_id}/block",
    tag = "slots",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("slot_id" = String, Path, description = "Slot identity token")
    ),
    responses(
        (status = 200, description = "Slot unblocked", body = TimeSlot)
    )
)]
pub async fn unblock_slot(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, slot_id)): Path<(i32, String)>,
) -> AppResult<Json<TimeSlot>> {
    claims.require_business(business_id)?;
    let slot = state
        .services
        .bookings
        .set_slot_blocked(business_id, &slot_id, false)
        .await?;
    Ok(Json(slot))
}

/// Override the seat count of one slot
#[utoipa::path(
    put,
    path = "/businesses/{business_id}/slots/{slot_id}/capacity",
    tag = "slots",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("slot_id" = String, Path, description = "Slot identity token")
    ),
    request_body = UpdateSlotCapacity,
    responses(
        (status = 200, description = "Capacity changed", body = TimeSlot),
        (status = 422, description = "Capacity below the seats already taken")
    )
)]
pub async fn set_slot_capacity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, slot_id)): Path<(i32, String)>,
    Json(request): Json<UpdateSlotCapacity>,
) -> AppResult<Json<TimeSlot>> {
    claims.require_business(business_id)?;
    let slot = state
        .services
        .bookings
        .set_slot_capacity(business_id, &slot_id, request.capacity)
        .await?;
    Ok(Json(slot))
}
