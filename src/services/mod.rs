//! Business logic services

pub mod availability;
pub mod bookings;
pub mod clock;
pub mod retry;
pub mod staff;

use std::sync::Arc;

use crate::{config::BookingConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub availability: availability::AvailabilityService,
    pub staff: staff::StaffService,
    pub bookings: bookings::BookingService,
    repository: Repository,
}

impl Services {
    /// Create all services over the given repository
    pub fn new(repository: Repository, config: BookingConfig, clock: Arc<dyn clock::Clock>) -> Self {
        let availability =
            availability::AvailabilityService::new(repository.clone(), config.clone(), clock.clone());
        let staff = staff::StaffService::new(repository.clone(), availability.clone());
        let bookings = bookings::BookingService::new(
            repository.clone(),
            availability.clone(),
            staff.clone(),
            config,
            clock,
        );

        Self {
            availability,
            staff,
            bookings,
            repository,
        }
    }

    /// Storage round trip for readiness probes
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.catalog.ping().await
    }
}
