//! Reservation storage operations
//!
//! Every state change is a conditional UPDATE on the expected current state,
//! so a caller that lost a race sees zero affected rows instead of clobbering
//! the winner. Slot exclusivity itself comes from the partial unique index
//! `ux_reservations_active_slot`.

use chrono::{DateTime, Utc};
use rusqlite::{named_params, params, Connection, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::catalog::seat_from_row;
use super::parse::{
    format_datetime, parse_datetime, parse_datetime_opt, parse_decimal, parse_release_reason_opt,
    parse_state, parse_uuid, OptionalExt,
};
use super::ACTIVE_RESERVATION;
use crate::error::{is_unique_violation, Error, Result};
use crate::models::{ReleaseReason, Reservation, ReservationState, Seat, SeatType, Ticket};

pub struct ReservationStore<'a> {
    conn: &'a Connection,
}

const RESERVATION_COLUMNS: &str = "id, show_id, seat_id, requester, state, price, created_at, \
     expires_at, confirmed_at, released_at, release_reason";

fn reservation_from_row(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        show_id: parse_uuid(&row.get::<_, String>(1)?)?,
        seat_id: parse_uuid(&row.get::<_, String>(2)?)?,
        requester: row.get(3)?,
        state: parse_state(&row.get::<_, String>(4)?)?,
        price: parse_decimal(&row.get::<_, String>(5)?)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        expires_at: parse_datetime(&row.get::<_, String>(7)?)?,
        confirmed_at: parse_datetime_opt(row.get::<_, Option<String>>(8)?)?,
        released_at: parse_datetime_opt(row.get::<_, Option<String>>(9)?)?,
        release_reason: parse_release_reason_opt(row.get::<_, Option<String>>(10)?)?,
    })
}

impl<'a> ReservationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a reservation row
    ///
    /// Fails with `AlreadyReserved` when another non-released row holds the slot.
    #[instrument(skip(self, reservation), fields(show_id = %reservation.show_id, seat_id = %reservation.seat_id))]
    pub fn insert(&self, reservation: &Reservation) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO reservations (id, show_id, seat_id, requester, state, price, created_at,
                    expires_at, confirmed_at, released_at, release_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    reservation.id.to_string(),
                    reservation.show_id.to_string(),
                    reservation.seat_id.to_string(),
                    reservation.requester,
                    reservation.state.as_str(),
                    reservation.price.to_string(),
                    format_datetime(reservation.created_at),
                    format_datetime(reservation.expires_at),
                    reservation.confirmed_at.map(format_datetime),
                    reservation.released_at.map(format_datetime),
                    reservation.release_reason.map(|r| r.as_str()),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::AlreadyReserved {
                        show_id: reservation.show_id,
                        seat_id: reservation.seat_id,
                    }
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    /// Find reservation by ID
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>> {
        let reservation = self
            .conn
            .query_row(
                &format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1"),
                params![id.to_string()],
                reservation_from_row,
            )
            .optional()?;
        Ok(reservation)
    }

    /// Reservations of a show in creation order, including released ones
    pub fn list_for_show(&self, show_id: Uuid) -> Result<Vec<Reservation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE show_id = ?1 ORDER BY created_at, id"
        ))?;
        let reservations = stmt
            .query_map(params![show_id.to_string()], reservation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reservations)
    }

    /// Release a lapsed hold occupying one slot so a new hold can take it
    pub fn release_expired_for_slot(
        &self,
        show_id: Uuid,
        seat_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let now = format_datetime(now);
        let count = self.conn.execute(
            "UPDATE reservations SET state = 'released', released_at = ?1, release_reason = ?2
             WHERE show_id = ?3 AND seat_id = ?4 AND state = 'held' AND expires_at <= ?1",
            params![
                now,
                ReleaseReason::Expired.as_str(),
                show_id.to_string(),
                seat_id.to_string(),
            ],
        )?;
        if count > 0 {
            debug!(%show_id, %seat_id, "Reclaimed expired hold");
        }
        Ok(count)
    }

    /// Held and unexpired -> confirmed. Returns rows changed (0 or 1).
    pub fn mark_confirmed(&self, id: Uuid, now: DateTime<Utc>) -> Result<usize> {
        let now = format_datetime(now);
        let count = self.conn.execute(
            "UPDATE reservations SET state = 'confirmed', confirmed_at = ?1
             WHERE id = ?2 AND state = 'held' AND expires_at > ?1",
            params![now, id.to_string()],
        )?;
        Ok(count)
    }

    /// `from` -> released. Returns rows changed (0 or 1).
    pub fn mark_released(
        &self,
        id: Uuid,
        from: ReservationState,
        reason: ReleaseReason,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let count = self.conn.execute(
            "UPDATE reservations SET state = 'released', released_at = ?1, release_reason = ?2
             WHERE id = ?3 AND state = ?4",
            params![
                format_datetime(now),
                reason.as_str(),
                id.to_string(),
                from.as_str(),
            ],
        )?;
        Ok(count)
    }

    /// Release every hold whose expiry has passed
    #[instrument(skip(self))]
    pub fn release_all_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let count = self.conn.execute(
            "UPDATE reservations SET state = 'released', released_at = ?1, release_reason = ?2
             WHERE state = 'held' AND expires_at <= ?1",
            params![format_datetime(now), ReleaseReason::Expired.as_str()],
        )?;
        Ok(count)
    }

    /// Confirmed plus live held reservations of a show
    pub fn count_active(&self, show_id: Uuid, now: DateTime<Utc>) -> Result<u32> {
        let count = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM reservations r WHERE r.show_id = :show_id AND {ACTIVE_RESERVATION}"
            ),
            named_params! {
                ":show_id": show_id.to_string(),
                ":now": format_datetime(now),
            },
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Seats of the show's room without an active reservation for that show
    pub fn free_seats(&self, show_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Seat>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT st.id, st.showroom_id, st.seat_number, st.seat_type
             FROM seats st
             JOIN shows s ON s.showroom_id = st.showroom_id
             WHERE s.id = :show_id
               AND NOT EXISTS (
                   SELECT 1 FROM reservations r
                   WHERE r.show_id = s.id AND r.seat_id = st.id AND {ACTIVE_RESERVATION}
               )
             ORDER BY st.seat_number"
        ))?;
        let seats = stmt
            .query_map(
                named_params! {
                    ":show_id": show_id.to_string(),
                    ":now": format_datetime(now),
                },
                seat_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(seats)
    }

    /// Ticket view of a reservation
    pub fn ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
        let ticket = self
            .conn
            .query_row(
                "SELECT r.id, m.title, sr.name, st.seat_number, st.seat_type,
                        s.start_time, s.end_time, r.price, r.state
                 FROM reservations r
                 JOIN shows s ON s.id = r.show_id
                 JOIN movies m ON m.id = s.movie_id
                 JOIN showrooms sr ON sr.id = s.showroom_id
                 JOIN seats st ON st.id = r.seat_id
                 WHERE r.id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(Ticket {
                        reservation_id: parse_uuid(&row.get::<_, String>(0)?)?,
                        movie_title: row.get(1)?,
                        showroom_name: row.get(2)?,
                        seat_number: row.get(3)?,
                        seat_type: SeatType::parse(&row.get::<_, String>(4)?),
                        start_time: parse_datetime(&row.get::<_, String>(5)?)?,
                        end_time: parse_datetime(&row.get::<_, String>(6)?)?,
                        price: parse_decimal(&row.get::<_, String>(7)?)?,
                        state: parse_state(&row.get::<_, String>(8)?)?,
                    })
                },
            )
            .optional()?;
        Ok(ticket)
    }
}
