//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{availability, bookings, health, slots, staff};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Slotwise API",
        version = "1.0.0",
        description = "Multi-tenant booking REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Availability
        availability::list_slots,
        availability::list_dates,
        availability::list_slot_staff,
        // Bookings
        bookings::create_booking,
        bookings::get_booking,
        bookings::my_bookings,
        bookings::cancel_booking,
        bookings::reschedule_booking,
        bookings::assign_staff,
        bookings::confirm_booking,
        bookings::complete_booking,
        bookings::mark_no_show,
        bookings::archive_booking,
        // Slots
        slots::block_slot,
        slots::unblock_slot,
        slots::set_slot_capacity,
        // Staff
        staff::get_availability,
        staff::set_availability,
        staff::bulk_set_availability,
        staff::sync_availability,
    ),
    components(
        schemas(
            crate::models::booking::Booking,
            crate::models::booking::BookingStatus,
            crate::models::booking::PaymentStatus,
            crate::models::booking::CustomerDetails,
            crate::models::booking::ServiceDetails,
            crate::models::booking::CreateBooking,
            crate::models::booking::CancelBooking,
            crate::models::booking::RescheduleBooking,
            crate::models::booking::AssignStaff,
            crate::models::time_slot::TimeSlot,
            crate::models::time_slot::SlotStatus,
            crate::models::time_slot::SlotView,
            crate::models::time_slot::UpdateSlotCapacity,
            crate::models::business::StaffMember,
            crate::models::staff_availability::StaffAvailability,
            crate::models::staff_availability::AvailabilityStatus,
            crate::models::staff_availability::AvailabilityWindow,
            crate::models::staff_availability::SetAvailability,
            crate::models::staff_availability::BulkAvailability,
            crate::models::staff_availability::SyncAvailability,
            crate::models::staff_availability::SyncReport,
            staff::BulkAvailabilityResponse,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "availability", description = "Slot and date availability"),
        (name = "bookings", description = "Booking lifecycle"),
        (name = "slots", description = "Slot administration"),
        (name = "staff", description = "Staff availability management")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
