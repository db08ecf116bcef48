//! API handlers for the Slotwise REST endpoints

pub mod availability;
pub mod bookings;
pub mod health;
pub mod openapi;
pub mod slots;
pub mod staff;

use std::time::Duration;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for the caller identity from the bearer token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState, timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Availability
        .route(
            "/businesses/:business_id/services/:service_id/slots",
            get(availability::list_slots),
        )
        .route(
            "/businesses/:business_id/services/:service_id/dates",
            get(availability::list_dates),
        )
        .route(
            "/businesses/:business_id/services/:service_id/slots/:slot_id/staff",
            get(availability::list_slot_staff),
        )
        // Bookings
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/bookings/:id/reschedule", post(bookings::reschedule_booking))
        .route("/me/bookings", get(bookings::my_bookings))
        .route(
            "/businesses/:business_id/bookings/:id",
            delete(bookings::archive_booking),
        )
        .route(
            "/businesses/:business_id/bookings/:id/assign-staff",
            post(bookings::assign_staff),
        )
        .route(
            "/businesses/:business_id/bookings/:id/confirm",
            post(bookings::confirm_booking),
        )
        .route(
            "/businesses/:business_id/bookings/:id/complete",
            post(bookings::complete_booking),
        )
        .route(
            "/businesses/:business_id/bookings/:id/no-show",
            post(bookings::mark_no_show),
        )
        // Slot administration
        .route(
            "/businesses/:business_id/slots/:slot_id/block",
            put(slots::block_slot).delete(slots::unblock_slot),
        )
        .route(
            "/businesses/:business_id/slots/:slot_id/capacity",
            put(slots::set_slot_capacity),
        )
        // Staff availability
        .route(
            "/businesses/:business_id/staff/:user_id/availability",
            get(staff::get_availability).put(staff::set_availability),
        )
        .route(
            "/businesses/:business_id/staff/:user_id/availability/bulk",
            post(staff::bulk_set_availability),
        )
        .route(
            "/businesses/:business_id/staff/availability/sync",
            post(staff::sync_availability),
        )
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
