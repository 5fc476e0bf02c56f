//! SQLite storage layer for Marquee
//!
//! One `Database` wraps one connection. Concurrent callers (threads, processes,
//! service instances) each open their own handle on the same file; SQLite's
//! write lock and the schema's unique constraints arbitrate between them.

mod catalog;
mod migrations;
mod parse;
mod pricing;
mod reservations;
mod shows;
mod traits;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Movie, Pricing, Reservation, Seat, Show, ShowListing, Showroom, Ticket, TimeRange,
};

pub use catalog::CatalogStore;
pub use pricing::PricingStore;
pub use reservations::ReservationStore;
pub use shows::ShowStore;
pub use traits::{
    CatalogRepository, PricingRepository, ReservationRepository, ShowRepository, Storage,
};

/// SQL predicate for a reservation aliased `r` that still occupies its seat.
/// Binds `:now`.
pub(crate) const ACTIVE_RESERVATION: &str =
    "(r.state = 'confirmed' OR (r.state = 'held' AND r.expires_at > :now))";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a file database, waiting up to `busy_timeout` for the write lock
    pub fn open_with_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        // WAL lets readers proceed while one writer holds the lock
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction
    ///
    /// The write lock is taken before `f` reads anything, so check-then-insert
    /// sequences inside `f` cannot interleave with another connection's.
    /// Commits when `f` returns `Ok`, rolls back otherwise.
    pub fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(&*tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `f` inside a deferred transaction
    ///
    /// Every query in `f` sees the same snapshot, so related counts taken
    /// back to back agree even while other connections commit.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)?;
        let value = f(&*tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Get catalog store
    pub fn catalog(&self) -> CatalogStore<'_> {
        CatalogStore::new(&self.conn)
    }

    /// Get show store
    pub fn shows(&self) -> ShowStore<'_> {
        ShowStore::new(&self.conn)
    }

    /// Get pricing store
    pub fn pricing(&self) -> PricingStore<'_> {
        PricingStore::new(&self.conn)
    }

    /// Get reservation store
    pub fn reservations(&self) -> ReservationStore<'_> {
        ReservationStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl CatalogRepository for Database {
    fn find_movie(&self, id: Uuid) -> Result<Option<Movie>> {
        self.catalog().find_movie(id)
    }

    fn list_movies(&self) -> Result<Vec<Movie>> {
        self.catalog().list_movies()
    }

    fn find_showroom(&self, id: Uuid) -> Result<Option<Showroom>> {
        self.catalog().find_showroom(id)
    }

    fn find_seat(&self, id: Uuid) -> Result<Option<Seat>> {
        self.catalog().find_seat(id)
    }

    fn seats_for_showroom(&self, showroom_id: Uuid) -> Result<Vec<Seat>> {
        self.catalog().seats_for_showroom(showroom_id)
    }

    fn count_seats(&self, showroom_id: Uuid) -> Result<u32> {
        self.catalog().count_seats(showroom_id)
    }
}

impl ShowRepository for Database {
    fn find_show(&self, id: Uuid) -> Result<Option<Show>> {
        self.shows().find_by_id(id)
    }

    fn list_shows_for_showroom(&self, showroom_id: Uuid) -> Result<Vec<Show>> {
        self.shows().list_for_showroom(showroom_id)
    }

    fn list_open_shows(&self, range: TimeRange, now: DateTime<Utc>) -> Result<Vec<Show>> {
        self.shows().list_open(range, now)
    }

    fn list_open_listings(
        &self,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<ShowListing>> {
        self.shows().list_open_listings(range, now)
    }
}

impl PricingRepository for Database {
    fn find_pricing_for_show(&self, show_id: Uuid) -> Result<Option<Pricing>> {
        self.pricing().find_for_show(show_id)
    }
}

impl ReservationRepository for Database {
    fn find_reservation(&self, id: Uuid) -> Result<Option<Reservation>> {
        self.reservations().find_by_id(id)
    }

    fn list_reservations_for_show(&self, show_id: Uuid) -> Result<Vec<Reservation>> {
        self.reservations().list_for_show(show_id)
    }

    fn count_active_reservations(&self, show_id: Uuid, now: DateTime<Utc>) -> Result<u32> {
        self.reservations().count_active(show_id, now)
    }

    fn free_seats(&self, show_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Seat>> {
        self.reservations().free_seats(show_id, now)
    }

    fn find_ticket(&self, reservation_id: Uuid) -> Result<Option<Ticket>> {
        self.reservations().ticket(reservation_id)
    }
}
