//! Marquee Core Library
//!
//! Catalog, scheduling, pricing and seat reservations for a cinema, on top of
//! a SQLite store that may be shared by several processes.

pub mod booking;
pub mod clock;
pub mod config;
pub mod error;
pub mod invariants;
pub mod models;
pub mod retry;
pub mod storage;

pub use booking::{
    AvailabilityView, BookingService, Catalog, PricingResolver, ReservationEngine, Scheduler,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::{Error, ErrorKind, Result};
pub use models::*;
pub use retry::RetryPolicy;
pub use storage::{
    CatalogRepository, Database, PricingRepository, ReservationRepository, ShowRepository,
    Storage,
};
