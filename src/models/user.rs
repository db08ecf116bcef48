//! Caller identity carried by the bearer token

use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::booking::{Booking, CustomerDetails};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Owner,
    Staff,
}

/// JWT claims issued by the authentication service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub user_id: i32,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    /// Business the owner or staff member acts for
    pub business_id: Option<i32>,
    pub exp: i64,
}

impl UserClaims {
    /// Create a token; the server only verifies, this serves tests and tooling
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and verify a token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn customer_details(&self) -> CustomerDetails {
        CustomerDetails {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }

    fn acts_for(&self, business_id: i32) -> bool {
        matches!(self.role, Role::Owner | Role::Staff) && self.business_id == Some(business_id)
    }

    /// Require owner or staff rights on `business_id`
    pub fn require_business(&self, business_id: i32) -> Result<(), AppError> {
        if self.acts_for(business_id) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "Not allowed to manage business {}",
                business_id
            )))
        }
    }

    /// The booking's customer, or someone acting for its business
    pub fn require_booking_access(&self, booking: &Booking) -> Result<(), AppError> {
        if booking.user_id == self.user_id || self.acts_for(booking.business_id) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "Not allowed to access booking {}",
                booking.id
            )))
        }
    }
}
