//! Booking services
//!
//! `BookingService` owns one database handle, a clock and the engine
//! configuration, and hands out short-lived component views the same way
//! `Database` hands out stores:
//!
//! - [`Catalog`]: movies, showrooms, seats
//! - [`Scheduler`]: non-overlapping shows per showroom
//! - [`PricingResolver`]: base price plus seat-type premium
//! - [`ReservationEngine`]: hold / confirm / release / sweep
//! - [`AvailabilityView`]: open shows, free seats, tickets

mod availability;
mod catalog;
mod pricing;
mod reservations;
mod scheduler;

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::storage::Database;

pub use availability::AvailabilityView;
pub use catalog::Catalog;
pub use pricing::PricingResolver;
pub use reservations::ReservationEngine;
pub use scheduler::Scheduler;

pub struct BookingService {
    db: Database,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl BookingService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self { db, clock, config }
    }

    /// Open the configured database file with the wall clock
    pub fn open(config: EngineConfig) -> Result<Self> {
        let path = config.resolve_database_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open_with_timeout(&path, config.busy_timeout())?;
        Ok(Self::new(db, Arc::new(SystemClock), config))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time at storage precision (microseconds)
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(self)
    }

    pub fn scheduler(&self) -> Scheduler<'_> {
        Scheduler::new(self)
    }

    pub fn pricing(&self) -> PricingResolver<'_> {
        PricingResolver::new(self)
    }

    pub fn reservations(&self) -> ReservationEngine<'_> {
        ReservationEngine::new(self)
    }

    pub fn availability(&self) -> AvailabilityView<'_> {
        AvailabilityView::new(self)
    }
}
