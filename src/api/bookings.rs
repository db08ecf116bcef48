//! Booking endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::booking::{AssignStaff, Booking, CancelBooking, CreateBooking, RescheduleBooking},
    services::bookings::Customer,
    AppState,
};

use super::AuthenticatedUser;

/// Book a slot for the caller
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    request_body = CreateBooking,
    responses(
        (status = 201, description = "Booking created", body = Booking),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Slot unavailable"),
        (status = 422, description = "Participants exceed the service capacity"),
        (status = 503, description = "Slot locked, retry later")
    )
)]
pub async fn create_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBooking>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    request.validate()?;

    let customer = Customer {
        user_id: claims.user_id,
        details: claims.customer_details(),
    };
    let booking = state.services.bookings.create_booking(request, customer).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Get a booking
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking", body = Booking),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Booking>> {
    let booking = state.services.bookings.get_booking(id).await?;
    claims.require_booking_access(&booking)?;
    Ok(Json(booking))
}

/// The caller's bookings, latest first
#[utoipa::path(
    get,
    path = "/me/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bookings", body = Vec<Booking>)
    )
)]
pub async fn my_bookings(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Booking>>> {
    let bookings = state
        .services
        .bookings
        .list_customer_bookings(claims.user_id)
        .await?;
    Ok(Json(bookings))
}

/// Cancel a booking and free its seats
#[utoipa::path(
    post,
    path = "/bookings/{id}/cancel",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking ID")),
    request_body = CancelBooking,
    responses(
        (status = 200, description = "Booking cancelled", body = Booking),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking can no longer be cancelled")
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    request: Option<Json<CancelBooking>>,
) -> AppResult<Json<Booking>> {
    let request = request.map(|Json(body)| body).unwrap_or_default();
    request.validate()?;

    let booking = state.services.bookings.get_booking(id).await?;
    claims.require_booking_access(&booking)?;

    let cancelled = state
        .services
        .bookings
        .cancel_booking(id, request.reason)
        .await?;
    Ok(Json(cancelled))
}

/// Move a booking to another slot
#[utoipa::path(
    post,
    path = "/bookings/{id}/reschedule",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking ID")),
    request_body = RescheduleBooking,
    responses(
        (status = 200, description = "Booking moved", body = Booking),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking cannot move or the new slot is unavailable")
    )
)]
pub async fn reschedule_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RescheduleBooking>,
) -> AppResult<Json<Booking>> {
    request.validate()?;

    let booking = state.services.bookings.get_booking(id).await?;
    claims.require_booking_access(&booking)?;

    let moved = state
        .services
        .bookings
        .reschedule_booking(id, request)
        .await?;
    Ok(Json(moved))
}

/// Give a booking a staff member
#[utoipa::path(
    post,
    path = "/businesses/{business_id}/bookings/{id}/assign-staff",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("id" = i32, Path, description = "Booking ID")
    ),
    request_body = AssignStaff,
    responses(
        (status = 200, description = "Staff assigned", body = Booking),
        (status = 400, description = "Staff member not eligible"),
        (status = 422, description = "Booking does not accept staff")
    )
)]
pub async fn assign_staff(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, id)): Path<(i32, i32)>,
    Json(request): Json<AssignStaff>,
) -> AppResult<Json<Booking>> {
    claims.require_business(business_id)?;
    let booking = state
        .services
        .bookings
        .assign_staff(business_id, id, request.staff_id)
        .await?;
    Ok(Json(booking))
}

/// Confirm a pending booking
#[utoipa::path(
    post,
    path = "/businesses/{business_id}/bookings/{id}/confirm",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking confirmed", body = Booking),
        (status = 422, description = "Booking cannot be confirmed")
    )
)]
pub async fn confirm_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, id)): Path<(i32, i32)>,
) -> AppResult<Json<Booking>> {
    claims.require_business(business_id)?;
    Ok(Json(state.services.bookings.confirm_booking(business_id, id).await?))
}

/// Mark a confirmed booking as completed
#[utoipa::path(
    post,
    path = "/businesses/{business_id}/bookings/{id}/complete",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking completed", body = Booking),
        (status = 422, description = "Booking is not confirmed")
    )
)]
pub async fn complete_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, id)): Path<(i32, i32)>,
) -> AppResult<Json<Booking>> {
    claims.require_business(business_id)?;
    Ok(Json(state.services.bookings.complete_booking(business_id, id).await?))
}

/// Record that the customer did not come
#[utoipa::path(
    post,
    path = "/businesses/{business_id}/bookings/{id}/no-show",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking marked as no-show", body = Booking),
        (status = 422, description = "Booking is not confirmed")
    )
)]
pub async fn mark_no_show(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, id)): Path<(i32, i32)>,
) -> AppResult<Json<Booking>> {
    claims.require_business(business_id)?;
    Ok(Json(state.services.bookings.mark_no_show(business_id, id).await?))
}

/// Archive a finished booking
#[utoipa::path(
    delete,
    path = "/businesses/{business_id}/bookings/{id}",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("business_id" = i32, Path, description = "Business ID"),
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 204, description = "Booking archived"),
        (status = 422, description = "Booking is still active")
    )
)]
pub async fn archive_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((business_id, id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    claims.require_business(business_id)?;
    state.services.bookings.archive_booking(business_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
