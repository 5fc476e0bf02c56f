//! Availability queries
//!
//! Nothing here is cached. Every answer is computed from stored timestamps
//! against the clock at call time, so a lapsed hold frees its seat without
//! waiting for a sweep.

use tracing::instrument;
use uuid::Uuid;

use super::BookingService;
use crate::error::{Error, Result};
use crate::invariants::assert_seat_accounting;
use crate::models::{Seat, Show, ShowListing, Ticket, TimeRange};
use crate::storage::{
    CatalogStore, ReservationRepository, ReservationStore, ShowRepository, ShowStore,
};

pub struct AvailabilityView<'a> {
    svc: &'a BookingService,
}

impl<'a> AvailabilityView<'a> {
    pub(super) fn new(svc: &'a BookingService) -> Self {
        Self { svc }
    }

    /// Shows starting in `range` with at least one free seat, by start time
    #[instrument(skip(self))]
    pub fn list_open_shows(&self, range: TimeRange) -> Result<Vec<Show>> {
        if range.is_empty() {
            return Err(Error::InvalidWindow);
        }
        self.svc.db.list_open_shows(range, self.svc.now())
    }

    /// Open shows with movie, showroom and free seat count
    #[instrument(skip(self))]
    pub fn listings(&self, range: TimeRange) -> Result<Vec<ShowListing>> {
        if range.is_empty() {
            return Err(Error::InvalidWindow);
        }
        self.svc.db.list_open_listings(range, self.svc.now())
    }

    /// Seats of the show's showroom not taken for this show, by seat number
    pub fn free_seats(&self, show_id: Uuid) -> Result<Vec<Seat>> {
        let now = self.svc.now();
        self.svc.db.read(|conn| {
            let show = ShowStore::new(conn)
                .find_by_id(show_id)?
                .ok_or(Error::UnknownShow(show_id))?;
            let reservations = ReservationStore::new(conn);
            let free = reservations.free_seats(show_id, now)?;

            if cfg!(debug_assertions) {
                let active = reservations.count_active(show_id, now)?;
                let total = CatalogStore::new(conn).count_seats(show.showroom_id)?;
                assert_seat_accounting(show_id, free.len(), active, total);
            }
            Ok(free)
        })
    }

    /// True when every seat is confirmed or held. A room without seats is booked out.
    pub fn is_booked_out(&self, show_id: Uuid) -> Result<bool> {
        Ok(self.free_seats(show_id)?.is_empty())
    }

    /// Where a reservation sits and what it cost
    pub fn ticket(&self, reservation_id: Uuid) -> Result<Ticket> {
        self.svc
            .db
            .find_ticket(reservation_id)?
            .ok_or_else(|| Error::NotFound(format!("reservation {reservation_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::testing::{at, cinema, cinema_in, dec, test_config};
    use crate::models::{ReservationState, SeatType};
    use crate::storage::Database;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn evening() -> TimeRange {
        TimeRange::new(at(12), at(23))
    }

    #[test]
    fn test_booked_out_show_leaves_and_returns() {
        let c = cinema();
        let engine = c.svc.reservations();
        let view = c.svc.availability();
        assert_eq!(view.list_open_shows(evening()).unwrap(), vec![c.show.clone()]);

        let mut last = None;
        for seat in &c.seats {
            let r = engine
                .hold(c.show.id, seat.id, "group", Duration::minutes(10))
                .unwrap();
            last = Some(engine.confirm(r.id).unwrap());
        }
        assert!(view.is_booked_out(c.show.id).unwrap());
        assert!(view.list_open_shows(evening()).unwrap().is_empty());

        let last = last.unwrap();
        engine.release(last.id).unwrap();
        assert_eq!(view.list_open_shows(evening()).unwrap(), vec![c.show.clone()]);
        assert_eq!(view.free_seats(c.show.id).unwrap().len(), 1);
    }

    #[test]
    fn test_expired_holds_free_seats_without_sweep() {
        let c = cinema();
        let view = c.svc.availability();
        for seat in &c.seats {
            c.svc
                .reservations()
                .hold(c.show.id, seat.id, "group", Duration::minutes(10))
                .unwrap();
        }
        assert!(view.list_open_shows(evening()).unwrap().is_empty());

        c.clock.advance(Duration::minutes(10));
        assert_eq!(view.free_seats(c.show.id).unwrap().len(), c.seats.len());
        assert_eq!(view.list_open_shows(evening()).unwrap().len(), 1);
    }

    #[test]
    fn test_seat_accounting() {
        let c = cinema();
        let engine = c.svc.reservations();
        let view = c.svc.availability();

        engine.hold(c.show.id, c.seat("A1").id, "a", Duration::minutes(30)).unwrap();
        let b = engine.hold(c.show.id, c.seat("B1").id, "b", Duration::minutes(30)).unwrap();
        engine.confirm(b.id).unwrap();
        engine.hold(c.show.id, c.seat("C1").id, "c", Duration::minutes(5)).unwrap();

        let check = || {
            let free = view.free_seats(c.show.id).unwrap().len();
            let active = engine.count_active(c.show.id).unwrap() as usize;
            assert_eq!(free + active, c.seats.len());
            free
        };
        assert_eq!(check(), 1);
        c.clock.advance(Duration::minutes(5));
        assert_eq!(check(), 2);

        let numbers: Vec<_> = view
            .free_seats(c.show.id)
            .unwrap()
            .into_iter()
            .map(|s| s.seat_number)
            .collect();
        assert_eq!(numbers, vec!["A2", "C1"]);
    }

    #[test]
    fn test_free_seats_consistent_while_other_handle_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cinema.db");
        let c = cinema_in(Database::open(&path).unwrap());
        let (show_id, seat_id) = (c.show.id, c.seat("A1").id);
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let (done, path, clock) = (&done, &path, c.clock.clone());
            let writer = scope.spawn(move || {
                let svc = BookingService::new(Database::open(path).unwrap(), clock, test_config());
                let mut cycles = 0;
                loop {
                    let r = svc
                        .reservations()
                        .hold(show_id, seat_id, "churn", Duration::minutes(10))
                        .unwrap();
                    svc.reservations().release(r.id).unwrap();
                    cycles += 1;
                    if done.load(Ordering::Relaxed) {
                        break cycles;
                    }
                }
            });

            let view = c.svc.availability();
            for _ in 0..500 {
                let free = view.free_seats(show_id).unwrap().len();
                assert!(free == c.seats.len() || free == c.seats.len() - 1);
            }
            done.store(true, Ordering::Relaxed);
            assert!(writer.join().unwrap() > 0);
        });
    }

    #[test]
    fn test_empty_showroom_is_booked_out() {
        let c = cinema();
        let bare = c.svc.catalog().create_showroom("Screen 0", &[]).unwrap();
        let show = c
            .svc
            .scheduler()
            .create_show(c.movie.id, bare.id, at(18), at(20))
            .unwrap();

        let view = c.svc.availability();
        assert!(view.is_booked_out(show.id).unwrap());
        assert_eq!(view.list_open_shows(evening()).unwrap(), vec![c.show.clone()]);
    }

    #[test]
    fn test_range_filters_by_start_time() {
        let c = cinema();
        let view = c.svc.availability();
        assert!(view.list_open_shows(TimeRange::new(at(12), at(18))).unwrap().is_empty());
        assert_eq!(view.list_open_shows(TimeRange::new(at(18), at(19))).unwrap().len(), 1);
        assert!(matches!(
            view.list_open_shows(TimeRange::new(at(19), at(18))),
            Err(Error::InvalidWindow)
        ));
        assert!(matches!(view.free_seats(Uuid::new_v4()), Err(Error::UnknownShow(_))));
    }

    #[test]
    fn test_listing_and_ticket() {
        let c = cinema();
        let view = c.svc.availability();
        let r = c
            .svc
            .reservations()
            .hold(c.show.id, c.seat("C1").id, "alice", Duration::minutes(10))
            .unwrap();

        let listings = view.listings(evening()).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].movie_title, "Spirited Away");
        assert_eq!(listings[0].showroom_name, "Screen 1");
        assert_eq!(listings[0].free_seats, 3);

        let ticket = view.ticket(r.id).unwrap();
        assert_eq!(ticket.seat_number, "C1");
        assert_eq!(ticket.seat_type, SeatType::Couple);
        assert_eq!(ticket.price, dec("12.50"));
        assert_eq!(ticket.state, ReservationState::Held);
        assert_eq!(ticket.start_time, at(18));
        assert!(matches!(view.ticket(Uuid::new_v4()), Err(Error::NotFound(_))));
    }
}
