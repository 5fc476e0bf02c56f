//! Catalog administration: movies, showrooms and their seating plans

use std::collections::HashSet;

use tracing::{info, instrument};
use uuid::Uuid;

use super::BookingService;
use crate::error::{Error, Result};
use crate::models::{Movie, NewSeat, Seat, Showroom};
use crate::storage::{CatalogRepository, CatalogStore};

pub struct Catalog<'a> {
    svc: &'a BookingService,
}

impl<'a> Catalog<'a> {
    pub(super) fn new(svc: &'a BookingService) -> Self {
        Self { svc }
    }

    /// Add a movie to the catalog
    #[instrument(skip(self))]
    pub fn create_movie(&self, title: &str, duration_minutes: u32, rating: &str) -> Result<Movie> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("movie title must not be empty".to_string()));
        }
        if duration_minutes == 0 {
            return Err(Error::Validation("movie duration must be positive".to_string()));
        }

        let movie = Movie::new(title.to_string(), duration_minutes, rating.trim().to_string());
        self.svc.db.catalog().create_movie(&movie)?;
        info!(movie_id = %movie.id, "Movie added");
        Ok(movie)
    }

    /// Create a showroom together with its fixed seating plan
    #[instrument(skip(self, seats), fields(seats = seats.len()))]
    pub fn create_showroom(&self, name: &str, seats: &[NewSeat]) -> Result<Showroom> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("showroom name must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for seat in seats {
            let number = seat.seat_number.trim();
            if number.is_empty() {
                return Err(Error::Validation("seat number must not be empty".to_string()));
            }
            if !seen.insert(number) {
                return Err(Error::Validation(format!("duplicate seat number {number}")));
            }
        }

        let showroom = Showroom::new(name.to_string());
        let rows: Vec<Seat> = seats
            .iter()
            .map(|s| Seat {
                id: Uuid::new_v4(),
                showroom_id: showroom.id,
                seat_number: s.seat_number.trim().to_string(),
                seat_type: s.seat_type.normalized(),
            })
            .collect();

        self.svc.config.retry.run("create_showroom", || {
            self.svc
                .db
                .write(|conn| CatalogStore::new(conn).create_showroom(&showroom, &rows))
        })?;

        info!(showroom_id = %showroom.id, seats = rows.len(), "Showroom created");
        Ok(showroom)
    }

    pub fn find_movie(&self, id: Uuid) -> Result<Option<Movie>> {
        self.svc.db.find_movie(id)
    }

    pub fn list_movies(&self) -> Result<Vec<Movie>> {
        self.svc.db.list_movies()
    }

    pub fn find_showroom(&self, id: Uuid) -> Result<Option<Showroom>> {
        self.svc.db.find_showroom(id)
    }

    pub fn find_seat(&self, id: Uuid) -> Result<Option<Seat>> {
        self.svc.db.find_seat(id)
    }

    pub fn seats_for_showroom(&self, showroom_id: Uuid) -> Result<Vec<Seat>> {
        self.svc.db.seats_for_showroom(showroom_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::testing::cinema;
    use crate::models::SeatType;

    #[test]
    fn test_fixture_catalog() {
        let c = cinema();
        assert_eq!(c.seats.len(), 4);
        assert_eq!(c.seat("B1").seat_type, SeatType::Vip);
        assert_eq!(c.svc.catalog().list_movies().unwrap(), vec![c.movie.clone()]);
        assert_eq!(c.svc.catalog().find_showroom(c.room.id).unwrap(), Some(c.room.clone()));
    }

    #[test]
    fn test_movie_validation() {
        let c = cinema();
        assert!(matches!(
            c.svc.catalog().create_movie("  ", 90, "PG"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            c.svc.catalog().create_movie("Tenet", 0, "PG-13"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_seat_numbers_rejected() {
        let c = cinema();
        let err = c
            .svc
            .catalog()
            .create_showroom("Screen 2", &[NewSeat::standard("A1"), NewSeat::standard(" A1")])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("A1")));
    }

    #[test]
    fn test_duplicate_showroom_is_conflict() {
        let c = cinema();
        let err = c.svc.catalog().create_showroom("Screen 1", &[]).unwrap_err();
        assert!(matches!(err, Error::DuplicateShowroom(_)));
    }
}
