//! Booking model and lifecycle

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use validator::Validate;

use super::text_enum_sqlx;

/// Booking status
///
/// `pending | unassigned -> confirmed -> completed`; `cancelled` is reachable
/// from any of the first three; `completed`, `cancelled` and `no-show` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Unassigned,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const CANCELLABLE: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Unassigned,
        BookingStatus::Confirmed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Unassigned => "unassigned",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no-show",
        }
    }

    /// Cancel and reschedule share this precondition
    pub fn is_cancellable(&self) -> bool {
        Self::CANCELLABLE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// Whether a staff member may still be (re)assigned
    pub fn accepts_staff(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Unassigned)
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "unassigned" => Ok(BookingStatus::Unassigned),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "no-show" => Ok(BookingStatus::NoShow),
            _ => Err(format!("Invalid booking status: {}", s)),
        }
    }
}

text_enum_sqlx!(BookingStatus);

/// Payment status; payment itself is handled elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

text_enum_sqlx!(PaymentStatus);

/// Customer snapshot taken at booking time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustomerDetails {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Service snapshot taken at booking time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceDetails {
    pub name: String,
    pub duration: i32,
    #[schema(value_type = String)]
    pub price: Decimal,
}

/// Booking row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: i32,
    pub user_id: i32,
    pub business_id: i32,
    pub venue_id: i32,
    pub service_id: i32,
    pub staff_id: Option<i32>,
    pub time_slot_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub participants: i32,
    #[schema(value_type = String)]
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    #[schema(value_type = CustomerDetails)]
    pub customer_details: Json<CustomerDetails>,
    #[schema(value_type = ServiceDetails)]
    pub service_details: Json<ServiceDetails>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Materialize a ledger row from an insert (used by the in-process store)
    pub fn from_new(id: i32, new: NewBooking, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            business_id: new.business_id,
            venue_id: new.venue_id,
            service_id: new.service_id,
            staff_id: new.staff_id,
            time_slot_id: new.time_slot_id,
            start_time: new.start_time,
            end_time: new.end_time,
            participants: new.participants,
            total_price: new.total_price,
            status: new.status,
            payment_status: PaymentStatus::Pending,
            customer_details: Json(new.customer_details),
            service_details: Json(new.service_details),
            notes: new.notes,
            cancellation_reason: None,
            cancelled_at: None,
            confirmed_at: if new.status == BookingStatus::Confirmed { Some(now) } else { None },
            completed_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether cancel/reschedule is allowed at `now` with the given minimum lead time
    pub fn can_be_changed(&self, now: DateTime<Utc>, lead: chrono::Duration) -> bool {
        self.status.is_cancellable() && self.start_time > now + lead
    }
}

/// Booking to insert, built by the orchestrator
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i32,
    pub business_id: i32,
    pub venue_id: i32,
    pub service_id: i32,
    pub staff_id: Option<i32>,
    pub time_slot_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub participants: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub customer_details: CustomerDetails,
    pub service_details: ServiceDetails,
    pub notes: Option<String>,
}

/// New slot binding for a rescheduled booking
#[derive(Debug, Clone)]
pub struct Rebinding {
    pub time_slot_id: i32,
    pub staff_id: Option<i32>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Lifecycle step applied by the ledger with an atomic status guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    AssignStaff(i32),
    Confirm,
    Complete,
    NoShow,
}

impl Transition {
    /// Statuses the booking must be in for the step to apply
    pub fn allowed_from(&self) -> &'static [BookingStatus] {
        match self {
            Transition::AssignStaff(_) => &[BookingStatus::Pending, BookingStatus::Unassigned],
            Transition::Confirm => &[BookingStatus::Pending],
            Transition::Complete | Transition::NoShow => &[BookingStatus::Confirmed],
        }
    }

    pub fn target(&self) -> BookingStatus {
        match self {
            Transition::AssignStaff(_) => BookingStatus::Pending,
            Transition::Confirm => BookingStatus::Confirmed,
            Transition::Complete => BookingStatus::Completed,
            Transition::NoShow => BookingStatus::NoShow,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transition::AssignStaff(_) => "assign staff to",
            Transition::Confirm => "confirm",
            Transition::Complete => "complete",
            Transition::NoShow => "mark as no-show",
        }
    }

    /// Apply to an in-memory row
    pub fn apply(&self, booking: &mut Booking, now: DateTime<Utc>) {
        match self {
            Transition::AssignStaff(staff_id) => booking.staff_id = Some(*staff_id),
            Transition::Confirm => booking.confirmed_at = Some(now),
            Transition::Complete => booking.completed_at = Some(now),
            Transition::NoShow => {}
        }
        booking.status = self.target();
        booking.updated_at = now;
    }
}

/// Create booking request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBooking {
    pub business_id: i32,
    pub service_id: i32,
    /// Slot identity token returned by the slot listing
    #[validate(length(min = 1, message = "Slot id is required"))]
    pub slot_id: String,
    pub staff_id: Option<i32>,
    #[validate(range(min = 1, message = "At least one participant is required"))]
    pub participants: i32,
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

/// Cancel booking request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CancelBooking {
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Reschedule booking request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RescheduleBooking {
    #[validate(length(min = 1, message = "Slot id is required"))]
    pub slot_id: String,
    pub staff_id: Option<i32>,
}

/// Staff assignment request
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignStaff {
    pub staff_id: i32,
}
