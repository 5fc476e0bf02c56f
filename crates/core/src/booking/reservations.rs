//! Reservation engine
//!
//! Hold, confirm and release run inside one `BEGIN IMMEDIATE` transaction per
//! attempt. The partial unique index on `(show_id, seat_id)` is the final word
//! on exclusivity; the pre-checks only produce better errors.

use chrono::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::BookingService;
use crate::config::MAX_HOLD_TTL_SECS;
use crate::error::{Error, Result};
use crate::invariants::{assert_reservation_invariants, assert_transition};
use crate::models::{ReleaseReason, Reservation, ReservationState};
use crate::storage::{
    CatalogStore, PricingStore, ReservationRepository, ReservationStore, ShowStore,
};

/// Result of a confirm attempt that must be committed either way
enum ConfirmOutcome {
    Confirmed(Reservation),
    Lapsed,
}

fn not_held(reservation: &Reservation) -> Error {
    match (reservation.state, reservation.release_reason) {
        (ReservationState::Confirmed, _) => Error::AlreadyConfirmed(reservation.id),
        // Reclaimed by a sweep or by a later hold on the same seat
        (ReservationState::Released, Some(ReleaseReason::Expired)) => {
            Error::Expired(reservation.id)
        }
        _ => Error::AlreadyReleased(reservation.id),
    }
}

fn reservation_not_found(id: Uuid) -> Error {
    Error::NotFound(format!("reservation {id}"))
}

pub struct ReservationEngine<'a> {
    svc: &'a BookingService,
}

impl<'a> ReservationEngine<'a> {
    pub(super) fn new(svc: &'a BookingService) -> Self {
        Self { svc }
    }

    /// Place a temporary hold on one seat of one show
    #[instrument(skip(self))]
    pub fn hold(
        &self,
        show_id: Uuid,
        seat_id: Uuid,
        requester: &str,
        ttl: Duration,
    ) -> Result<Reservation> {
        if ttl <= Duration::zero() || ttl > Duration::seconds(MAX_HOLD_TTL_SECS as i64) {
            return Err(Error::InvalidTtl);
        }
        let requester = requester.trim();
        if requester.is_empty() {
            return Err(Error::Validation("requester must not be empty".to_string()));
        }

        let reservation = self.svc.config.retry.run("hold", || {
            let now = self.svc.now();
            now.checked_add_signed(ttl).ok_or(Error::InvalidTtl)?;
            self.svc.db.write(|conn| {
                let show = ShowStore::new(conn)
                    .find_by_id(show_id)?
                    .ok_or(Error::UnknownShow(show_id))?;
                let seat = CatalogStore::new(conn)
                    .find_seat(seat_id)?
                    .ok_or(Error::UnknownSeat(seat_id))?;
                if seat.showroom_id != show.showroom_id {
                    return Err(Error::SeatNotInShowroom {
                        seat_id,
                        showroom_id: show.showroom_id,
                    });
                }
                let price = PricingStore::new(conn)
                    .find_for_show(show_id)?
                    .ok_or(Error::NoPricingSet(show_id))?
                    .charge_for(&seat.seat_type);

                let store = ReservationStore::new(conn);
                store.release_expired_for_slot(show_id, seat_id, now)?;

                let reservation =
                    Reservation::held(show_id, seat_id, requester.to_string(), price, now, ttl);
                store.insert(&reservation)?;
                Ok(reservation)
            })
        })?;

        assert_reservation_invariants(&reservation);
        debug!(
            reservation_id = %reservation.id,
            expires_at = %reservation.expires_at,
            price = %reservation.price,
            "Seat held"
        );
        Ok(reservation)
    }

    /// `hold` with the configured default TTL
    pub fn hold_default(&self, show_id: Uuid, seat_id: Uuid, requester: &str) -> Result<Reservation> {
        self.hold(show_id, seat_id, requester, self.svc.config.hold_ttl())
    }

    /// Turn a live hold into a confirmed sale
    ///
    /// A hold found past its expiry is released before `Expired` is returned.
    /// A hold already released for expiry also yields `Expired`.
    #[instrument(skip(self))]
    pub fn confirm(&self, reservation_id: Uuid) -> Result<Reservation> {
        let outcome = self.svc.config.retry.run("confirm", || {
            let now = self.svc.now();
            self.svc.db.write(|conn| {
                let store = ReservationStore::new(conn);
                let current = store
                    .find_by_id(reservation_id)?
                    .ok_or_else(|| reservation_not_found(reservation_id))?;
                if current.state != ReservationState::Held {
                    return Err(not_held(&current));
                }

                if current.is_expired_at(now) {
                    assert_transition(current.state, ReservationState::Released);
                    store.mark_released(
                        reservation_id,
                        ReservationState::Held,
                        ReleaseReason::Expired,
                        now,
                    )?;
                    return Ok(ConfirmOutcome::Lapsed);
                }

                assert_transition(current.state, ReservationState::Confirmed);
                if store.mark_confirmed(reservation_id, now)? == 0 {
                    let latest = store
                        .find_by_id(reservation_id)?
                        .ok_or_else(|| reservation_not_found(reservation_id))?;
                    return Err(not_held(&latest));
                }
                let confirmed = store
                    .find_by_id(reservation_id)?
                    .ok_or_else(|| reservation_not_found(reservation_id))?;
                Ok(ConfirmOutcome::Confirmed(confirmed))
            })
        })?;

        match outcome {
            ConfirmOutcome::Confirmed(reservation) => {
                assert_reservation_invariants(&reservation);
                debug!(%reservation_id, "Reservation confirmed");
                Ok(reservation)
            }
            ConfirmOutcome::Lapsed => {
                debug!(%reservation_id, "Hold expired before confirmation");
                Err(Error::Expired(reservation_id))
            }
        }
    }

    /// Cancel a hold or a sale. Releasing twice is a no-op.
    pub fn release(&self, reservation_id: Uuid) -> Result<Reservation> {
        self.release_with_reason(reservation_id, ReleaseReason::Cancelled)
    }

    /// Release with an explicit reason, e.g. a failed payment
    #[instrument(skip(self))]
    pub fn release_with_reason(
        &self,
        reservation_id: Uuid,
        reason: ReleaseReason,
    ) -> Result<Reservation> {
        let reservation = self.svc.config.retry.run("release", || {
            let now = self.svc.now();
            self.svc.db.write(|conn| {
                let store = ReservationStore::new(conn);
                let current = store
                    .find_by_id(reservation_id)?
                    .ok_or_else(|| reservation_not_found(reservation_id))?;
                if current.state == ReservationState::Released {
                    return Ok(current);
                }

                assert_transition(current.state, ReservationState::Released);
                store.mark_released(reservation_id, current.state, reason, now)?;
                store
                    .find_by_id(reservation_id)?
                    .ok_or_else(|| reservation_not_found(reservation_id))
            })
        })?;

        assert_reservation_invariants(&reservation);
        debug!(%reservation_id, reason = reason.as_str(), "Reservation released");
        Ok(reservation)
    }

    /// Release every lapsed hold. Returns how many were released.
    #[instrument(skip(self))]
    pub fn sweep_expired(&self) -> Result<usize> {
        let released = self.svc.config.retry.run("sweep_expired", || {
            let now = self.svc.now();
            self.svc
                .db
                .write(|conn| ReservationStore::new(conn).release_all_expired(now))
        })?;

        if released > 0 {
            info!(released, "Expired holds released");
        }
        Ok(released)
    }

    pub fn find(&self, reservation_id: Uuid) -> Result<Option<Reservation>> {
        self.svc.db.find_reservation(reservation_id)
    }

    /// Every reservation of a show, including released ones
    pub fn list_for_show(&self, show_id: Uuid) -> Result<Vec<Reservation>> {
        self.svc.db.list_reservations_for_show(show_id)
    }

    /// Confirmed plus live held reservations of a show
    pub fn count_active(&self, show_id: Uuid) -> Result<u32> {
        self.svc.db.count_active_reservations(show_id, self.svc.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::testing::{at, cinema, cinema_in, dec, test_config};
    use crate::storage::Database;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_hold_captures_price_and_expiry() {
        let c = cinema();
        let now = c.svc.now();
        let r = c
            .svc
            .reservations()
            .hold(c.show.id, c.seat("B1").id, "checkout-1", Duration::minutes(10))
            .unwrap();

        assert_eq!(r.state, ReservationState::Held);
        assert_eq!(r.price, dec("15.00"));
        assert_eq!(r.expires_at, now + Duration::minutes(10));
        assert_eq!(c.svc.reservations().find(r.id).unwrap(), Some(r));
    }

    #[test]
    fn test_hold_rejections() {
        let c = cinema();
        let engine = c.svc.reservations();
        let seat = c.seat("A1").id;

        assert!(matches!(
            engine.hold(c.show.id, seat, "x", Duration::zero()),
            Err(Error::InvalidTtl)
        ));
        assert!(matches!(
            engine.hold(Uuid::new_v4(), seat, "x", Duration::minutes(1)),
            Err(Error::UnknownShow(_))
        ));
        assert!(matches!(
            engine.hold(c.show.id, Uuid::new_v4(), "x", Duration::minutes(1)),
            Err(Error::UnknownSeat(_))
        ));

        let other = c
            .svc
            .catalog()
            .create_showroom("Screen 2", &[crate::models::NewSeat::standard("Z9")])
            .unwrap();
        let foreign = c.svc.catalog().seats_for_showroom(other.id).unwrap()[0].id;
        assert!(matches!(
            engine.hold(c.show.id, foreign, "x", Duration::minutes(1)),
            Err(Error::SeatNotInShowroom { .. })
        ));

        let unpriced = c
            .svc
            .scheduler()
            .create_show(c.movie.id, c.room.id, at(21), at(23))
            .unwrap();
        assert!(matches!(
            engine.hold(unpriced.id, seat, "x", Duration::minutes(1)),
            Err(Error::NoPricingSet(_))
        ));
    }

    #[test]
    fn test_second_hold_rejected_until_expiry() {
        let c = cinema();
        let engine = c.svc.reservations();
        let seat = c.seat("A1").id;
        let first = engine.hold(c.show.id, seat, "alice", Duration::minutes(5)).unwrap();

        assert!(matches!(
            engine.hold(c.show.id, seat, "bob", Duration::minutes(5)),
            Err(Error::AlreadyReserved { .. })
        ));

        c.clock.advance(Duration::minutes(5));
        let second = engine.hold(c.show.id, seat, "bob", Duration::minutes(5)).unwrap();
        assert_eq!(second.requester, "bob");

        let lapsed = engine.find(first.id).unwrap().unwrap();
        assert_eq!(lapsed.state, ReservationState::Released);
        assert_eq!(lapsed.release_reason, Some(ReleaseReason::Expired));
    }

    #[test]
    fn test_confirm_then_conflicts() {
        let c = cinema();
        let engine = c.svc.reservations();
        let r = engine
            .hold(c.show.id, c.seat("C1").id, "alice", Duration::minutes(5))
            .unwrap();

        let confirmed = engine.confirm(r.id).unwrap();
        assert_eq!(confirmed.state, ReservationState::Confirmed);
        assert_eq!(confirmed.confirmed_at, Some(c.svc.now()));
        assert!(matches!(engine.confirm(r.id), Err(Error::AlreadyConfirmed(_))));

        // A confirmed seat never lapses
        c.clock.advance(Duration::hours(2));
        assert_eq!(engine.sweep_expired().unwrap(), 0);
        assert!(matches!(
            engine.hold(c.show.id, c.seat("C1").id, "bob", Duration::minutes(5)),
            Err(Error::AlreadyReserved { .. })
        ));

        engine.release(r.id).unwrap();
        assert!(matches!(engine.confirm(r.id), Err(Error::AlreadyReleased(_))));
        assert!(matches!(engine.confirm(Uuid::new_v4()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_confirm_after_expiry_releases() {
        let c = cinema();
        let engine = c.svc.reservations();
        let r = engine
            .hold(c.show.id, c.seat("A2").id, "alice", Duration::minutes(10))
            .unwrap();

        c.clock.advance(Duration::minutes(10));
        assert!(matches!(engine.confirm(r.id), Err(Error::Expired(id)) if id == r.id));

        let stored = engine.find(r.id).unwrap().unwrap();
        assert_eq!(stored.state, ReservationState::Released);
        assert_eq!(stored.release_reason, Some(ReleaseReason::Expired));
        assert_eq!(stored.released_at, Some(c.svc.now()));
    }

    #[test]
    fn test_confirm_after_sweep_is_expired() {
        let c = cinema();
        let engine = c.svc.reservations();
        let r = engine
            .hold(c.show.id, c.seat("A1").id, "alice", Duration::minutes(1))
            .unwrap();

        c.clock.advance(Duration::minutes(2));
        assert_eq!(engine.sweep_expired().unwrap(), 1);
        assert!(matches!(engine.confirm(r.id), Err(Error::Expired(id)) if id == r.id));
    }

    #[test]
    fn test_confirm_after_slot_reclaimed_is_expired() {
        let c = cinema();
        let engine = c.svc.reservations();
        let seat = c.seat("A1").id;
        let first = engine.hold(c.show.id, seat, "alice", Duration::minutes(1)).unwrap();

        c.clock.advance(Duration::minutes(2));
        let second = engine.hold(c.show.id, seat, "bob", Duration::minutes(5)).unwrap();

        assert!(matches!(engine.confirm(first.id), Err(Error::Expired(id)) if id == first.id));
        assert_eq!(engine.confirm(second.id).unwrap().state, ReservationState::Confirmed);
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let c = cinema();
        let engine = c.svc.reservations();
        let seat = c.seat("A1").id;

        assert!(matches!(
            engine.hold(c.show.id, seat, "x", Duration::days(365 * 300_000)),
            Err(Error::InvalidTtl)
        ));
        assert!(matches!(
            engine.hold(c.show.id, seat, "x", Duration::days(8)),
            Err(Error::InvalidTtl)
        ));

        let longest = Duration::seconds(MAX_HOLD_TTL_SECS as i64);
        let r = engine.hold(c.show.id, seat, "x", longest).unwrap();
        assert_eq!(r.expires_at - r.created_at, longest);
    }

    #[test]
    fn test_release_is_idempotent() {
        let c = cinema();
        let engine = c.svc.reservations();
        let r = engine
            .hold(c.show.id, c.seat("A1").id, "alice", Duration::minutes(10))
            .unwrap();

        let first = engine.release(r.id).unwrap();
        c.clock.advance(Duration::minutes(1));
        let second = engine.release_with_reason(r.id, ReleaseReason::PaymentFailed).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.release_reason, Some(ReleaseReason::Cancelled));
        assert!(matches!(engine.release(Uuid::new_v4()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_payment_failure_frees_seat() {
        let c = cinema();
        let engine = c.svc.reservations();
        let seat = c.seat("B1").id;
        let r = engine.hold_default(c.show.id, seat, "alice").unwrap();
        assert_eq!(r.expires_at - r.created_at, c.svc.config().hold_ttl());

        let released = engine
            .release_with_reason(r.id, ReleaseReason::PaymentFailed)
            .unwrap();
        assert_eq!(released.release_reason, Some(ReleaseReason::PaymentFailed));
        engine.hold_default(c.show.id, seat, "bob").unwrap();
    }

    #[test]
    fn test_sweep_counts_lapsed_holds() {
        let c = cinema();
        let engine = c.svc.reservations();
        engine.hold(c.show.id, c.seat("A1").id, "a", Duration::minutes(1)).unwrap();
        engine.hold(c.show.id, c.seat("A2").id, "b", Duration::minutes(1)).unwrap();
        engine.hold(c.show.id, c.seat("B1").id, "c", Duration::minutes(30)).unwrap();

        assert_eq!(engine.sweep_expired().unwrap(), 0);
        c.clock.advance(Duration::minutes(2));
        assert_eq!(engine.count_active(c.show.id).unwrap(), 1);
        assert_eq!(engine.sweep_expired().unwrap(), 2);
        assert_eq!(engine.sweep_expired().unwrap(), 0);
        assert_eq!(engine.list_for_show(c.show.id).unwrap().len(), 3);
    }

    #[test]
    fn test_concurrent_holds_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cinema.db");
        let c = cinema_in(Database::open(&path).unwrap());
        let seat_id = c.seat("A1").id;

        const BUYERS: usize = 8;
        let barrier = Arc::new(Barrier::new(BUYERS));
        let results: Vec<Result<Reservation>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..BUYERS)
                .map(|i| {
                    let barrier = barrier.clone();
                    let path = path.clone();
                    let clock = c.clock.clone();
                    let show_id = c.show.id;
                    scope.spawn(move || {
                        let svc = BookingService::new(
                            Database::open(&path).unwrap(),
                            clock,
                            test_config(),
                        );
                        barrier.wait();
                        svc.reservations().hold(
                            show_id,
                            seat_id,
                            &format!("buyer-{i}"),
                            Duration::minutes(10),
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::AlreadyReserved { .. })));
        assert_eq!(c.svc.reservations().count_active(c.show.id).unwrap(), 1);
    }
}
