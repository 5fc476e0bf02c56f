//! Storage repository traits
//!
//! Read-side interface the booking services query through. Writes that must
//! be atomic go through `Database::write` and the concrete stores instead.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Movie, Pricing, Reservation, Seat, Show, ShowListing, Showroom, Ticket, TimeRange,
};

/// Movie, showroom and seat lookups
pub trait CatalogRepository {
    fn find_movie(&self, id: Uuid) -> Result<Option<Movie>>;

    fn list_movies(&self) -> Result<Vec<Movie>>;

    fn find_showroom(&self, id: Uuid) -> Result<Option<Showroom>>;

    fn find_seat(&self, id: Uuid) -> Result<Option<Seat>>;

    /// Seating plan ordered by seat number
    fn seats_for_showroom(&self, showroom_id: Uuid) -> Result<Vec<Seat>>;

    fn count_seats(&self, showroom_id: Uuid) -> Result<u32>;
}

/// Show lookups
pub trait ShowRepository {
    fn find_show(&self, id: Uuid) -> Result<Option<Show>>;

    fn list_shows_for_showroom(&self, showroom_id: Uuid) -> Result<Vec<Show>>;

    /// Shows starting in `range` with at least one free seat at `now`
    fn list_open_shows(&self, range: TimeRange, now: DateTime<Utc>) -> Result<Vec<Show>>;

    fn list_open_listings(&self, range: TimeRange, now: DateTime<Utc>)
        -> Result<Vec<ShowListing>>;
}

/// Pricing lookups
pub trait PricingRepository {
    fn find_pricing_for_show(&self, show_id: Uuid) -> Result<Option<Pricing>>;
}

/// Reservation lookups
pub trait ReservationRepository {
    fn find_reservation(&self, id: Uuid) -> Result<Option<Reservation>>;

    fn list_reservations_for_show(&self, show_id: Uuid) -> Result<Vec<Reservation>>;

    fn count_active_reservations(&self, show_id: Uuid, now: DateTime<Utc>) -> Result<u32>;

    fn free_seats(&self, show_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Seat>>;

    fn find_ticket(&self, reservation_id: Uuid) -> Result<Option<Ticket>>;
}

/// Combined storage interface
pub trait Storage:
    CatalogRepository + ShowRepository + PricingRepository + ReservationRepository
{
}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where
    T: CatalogRepository + ShowRepository + PricingRepository + ReservationRepository
{
}
