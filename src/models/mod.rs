//! Data models for Slotwise

/// Implements the sqlx text mapping for an enum exposing `as_str` and `FromStr<Err = String>`
macro_rules! text_enum_sqlx {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

pub(crate) use text_enum_sqlx;

pub mod booking;
pub mod business;
pub mod staff_availability;
pub mod time_slot;
pub mod user;

// Re-export commonly used types
pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use business::{Business, Service, StaffMember, Venue};
pub use staff_availability::{AvailabilityStatus, StaffAvailability};
pub use time_slot::{SlotKey, SlotStatus, TimeSlot};
pub use user::{Role, UserClaims};
