//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{Reservation, ReservationState, Show};

/// Validate that a show occupies a non-empty window
pub fn assert_show_invariants(show: &Show) {
    debug_assert!(
        show.end_time > show.start_time,
        "Show {} ends at {} before it starts at {}",
        show.id,
        show.end_time,
        show.start_time
    );
}

/// Validate that a reservation's timestamps match its state
pub fn assert_reservation_invariants(reservation: &Reservation) {
    debug_assert!(
        reservation.expires_at > reservation.created_at,
        "Reservation {} expires before it was created",
        reservation.id
    );

    match reservation.state {
        ReservationState::Held => debug_assert!(
            reservation.confirmed_at.is_none() && reservation.released_at.is_none(),
            "Held reservation {} carries a terminal timestamp",
            reservation.id
        ),
        ReservationState::Confirmed => debug_assert!(
            reservation.confirmed_at.is_some() && reservation.released_at.is_none(),
            "Confirmed reservation {} has inconsistent timestamps",
            reservation.id
        ),
        ReservationState::Released => debug_assert!(
            reservation.released_at.is_some() && reservation.release_reason.is_some(),
            "Released reservation {} has no release time or reason",
            reservation.id
        ),
    }
}

/// Validate a lifecycle step
pub fn assert_transition(from: ReservationState, to: ReservationState) {
    debug_assert!(
        from.can_transition_to(to),
        "Illegal reservation transition {} -> {}",
        from,
        to
    );
}

/// Free plus active must cover the seating plan exactly
pub fn assert_seat_accounting(show_id: Uuid, free: usize, active: u32, total: u32) {
    debug_assert!(
        free + active as usize == total as usize,
        "Show {} seat accounting off: {} free + {} active != {} seats",
        show_id,
        free,
        active,
        total
    );
}
