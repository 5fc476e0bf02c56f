//! Show scheduling
//!
//! The overlap check and the insert share one immediate transaction, so two
//! admins scheduling into the same showroom at once cannot both succeed.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::BookingService;
use crate::error::{Error, Result};
use crate::invariants::assert_show_invariants;
use crate::models::Show;
use crate::storage::{CatalogStore, ShowRepository, ShowStore};

pub struct Scheduler<'a> {
    svc: &'a BookingService,
}

impl<'a> Scheduler<'a> {
    pub(super) fn new(svc: &'a BookingService) -> Self {
        Self { svc }
    }

    /// Schedule `movie_id` in `showroom_id` over `[start_time, end_time)`
    #[instrument(skip(self))]
    pub fn create_show(
        &self,
        movie_id: Uuid,
        showroom_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Show> {
        if end_time <= start_time {
            return Err(Error::InvalidWindow);
        }

        let show = self.svc.config.retry.run("create_show", || {
            self.svc.db.write(|conn| {
                let catalog = CatalogStore::new(conn);
                let movie = catalog
                    .find_movie(movie_id)?
                    .ok_or(Error::UnknownMovie(movie_id))?;
                catalog
                    .find_showroom(showroom_id)?
                    .ok_or(Error::UnknownShowroom(showroom_id))?;

                let shows = ShowStore::new(conn);
                if let Some(existing) = shows.find_overlapping(showroom_id, start_time, end_time)? {
                    return Err(Error::OverlappingShow {
                        existing: existing.id,
                    });
                }

                let slot_minutes = (end_time - start_time).num_minutes();
                if slot_minutes < i64::from(movie.duration_minutes) {
                    warn!(
                        slot_minutes,
                        duration_minutes = movie.duration_minutes,
                        "Show window is shorter than the movie"
                    );
                }

                let show = Show::new(movie_id, showroom_id, start_time, end_time);
                shows.create(&show)?;
                Ok(show)
            })
        })?;

        assert_show_invariants(&show);
        info!(show_id = %show.id, "Show scheduled");
        Ok(show)
    }

    /// Every show in a showroom, by start time
    pub fn shows_in_showroom(&self, showroom_id: Uuid) -> Result<Vec<Show>> {
        self.svc.db.list_shows_for_showroom(showroom_id)
    }

    pub fn find_show(&self, show_id: Uuid) -> Result<Option<Show>> {
        self.svc.db.find_show(show_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::testing::{at, cinema, cinema_in, seating_plan, test_config};
    use crate::storage::Database;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_rejects_overlap_accepts_touching() {
        let c = cinema();
        let scheduler = c.svc.scheduler();
        let room = c.svc.catalog().create_showroom("Screen 9", &seating_plan()).unwrap();

        scheduler.create_show(c.movie.id, room.id, at(15), at(17)).unwrap();

        let err = scheduler
            .create_show(c.movie.id, room.id, at(14), at(16))
            .unwrap_err();
        assert!(matches!(err, Error::OverlappingShow { .. }));

        scheduler.create_show(c.movie.id, room.id, at(17), at(19)).unwrap();
        assert_eq!(scheduler.shows_in_showroom(room.id).unwrap().len(), 2);
    }

    #[test]
    fn test_following_show_may_start_at_previous_end() {
        let c = cinema();
        let room = c.svc.catalog().create_showroom("Screen 10", &[]).unwrap();
        let scheduler = c.svc.scheduler();
        scheduler.create_show(c.movie.id, room.id, at(14), at(16)).unwrap();

        scheduler.create_show(c.movie.id, room.id, at(16), at(18)).unwrap();
        // 15:00-17:00 now collides with both
        assert!(matches!(
            scheduler.create_show(c.movie.id, room.id, at(15), at(17)),
            Err(Error::OverlappingShow { .. })
        ));
    }

    #[test]
    fn test_other_showroom_unaffected() {
        let c = cinema();
        let other = c.svc.catalog().create_showroom("Screen 2", &[]).unwrap();
        // Fixture show occupies Screen 1 18:00-20:00
        c.svc
            .scheduler()
            .create_show(c.movie.id, other.id, at(18), at(20))
            .unwrap();
    }

    #[test]
    fn test_invalid_window_and_references() {
        let c = cinema();
        let scheduler = c.svc.scheduler();
        assert!(matches!(
            scheduler.create_show(c.movie.id, c.room.id, at(10), at(10)),
            Err(Error::InvalidWindow)
        ));
        assert!(matches!(
            scheduler.create_show(Uuid::new_v4(), c.room.id, at(8), at(10)),
            Err(Error::UnknownMovie(_))
        ));
        assert!(matches!(
            scheduler.create_show(c.movie.id, Uuid::new_v4(), at(8), at(10)),
            Err(Error::UnknownShowroom(_))
        ));
    }

    #[test]
    fn test_concurrent_overlapping_shows_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cinema.db");
        let c = cinema_in(Database::open(&path).unwrap());
        let room = c.svc.catalog().create_showroom("Screen 3", &[]).unwrap();

        const ADMINS: usize = 6;
        let barrier = Arc::new(Barrier::new(ADMINS));
        let results: Vec<Result<Show>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..ADMINS)
                .map(|i| {
                    let barrier = barrier.clone();
                    let path = path.clone();
                    let clock = c.clock.clone();
                    let (movie_id, room_id) = (c.movie.id, room.id);
                    scope.spawn(move || {
                        let svc = BookingService::new(
                            Database::open(&path).unwrap(),
                            clock,
                            test_config(),
                        );
                        barrier.wait();
                        // Staggered windows that all overlap 12:00-13:00
                        let start = at(10) + chrono::Duration::minutes(10 * i as i64);
                        svc.scheduler().create_show(movie_id, room_id, start, at(13))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::OverlappingShow { .. })));
        assert_eq!(c.svc.scheduler().shows_in_showroom(room.id).unwrap().len(), 1);
    }
}
