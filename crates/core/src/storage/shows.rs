//! Show storage operations

use chrono::{DateTime, Utc};
use rusqlite::{named_params, params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{format_datetime, parse_datetime, parse_uuid, OptionalExt};
use super::ACTIVE_RESERVATION;
use crate::error::Result;
use crate::models::{Show, ShowListing, TimeRange};

pub struct ShowStore<'a> {
    conn: &'a Connection,
}

const SHOW_COLUMNS: &str = "s.id, s.movie_id, s.showroom_id, s.start_time, s.end_time";

fn show_from_row(row: &Row<'_>) -> rusqlite::Result<Show> {
    Ok(Show {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        movie_id: parse_uuid(&row.get::<_, String>(1)?)?,
        showroom_id: parse_uuid(&row.get::<_, String>(2)?)?,
        start_time: parse_datetime(&row.get::<_, String>(3)?)?,
        end_time: parse_datetime(&row.get::<_, String>(4)?)?,
    })
}

/// Seats of the show's room with no active reservation for the show.
/// Expects `:now` to be bound.
fn free_seat_count_sql() -> String {
    format!(
        "(SELECT COUNT(*) FROM seats st
          WHERE st.showroom_id = s.showroom_id
            AND NOT EXISTS (
                SELECT 1 FROM reservations r
                WHERE r.show_id = s.id AND r.seat_id = st.id AND {ACTIVE_RESERVATION}
            ))"
    )
}

impl<'a> ShowStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a show. Overlap is checked by the caller in the same transaction.
    #[instrument(skip(self, show), fields(show_id = %show.id, showroom_id = %show.showroom_id))]
    pub fn create(&self, show: &Show) -> Result<()> {
        self.conn.execute(
            "INSERT INTO shows (id, movie_id, showroom_id, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                show.id.to_string(),
                show.movie_id.to_string(),
                show.showroom_id.to_string(),
                format_datetime(show.start_time),
                format_datetime(show.end_time),
            ],
        )?;
        Ok(())
    }

    /// Find show by ID
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Show>> {
        let show = self
            .conn
            .query_row(
                &format!("SELECT {SHOW_COLUMNS} FROM shows s WHERE s.id = ?1"),
                params![id.to_string()],
                show_from_row,
            )
            .optional()?;
        Ok(show)
    }

    /// First show in the showroom whose `[start, end)` intersects the given window
    pub fn find_overlapping(
        &self,
        showroom_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Show>> {
        let show = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SHOW_COLUMNS} FROM shows s
                     WHERE s.showroom_id = ?1 AND s.start_time < ?3 AND s.end_time > ?2
                     ORDER BY s.start_time LIMIT 1"
                ),
                params![
                    showroom_id.to_string(),
                    format_datetime(start),
                    format_datetime(end),
                ],
                show_from_row,
            )
            .optional()?;
        Ok(show)
    }

    /// Schedule of one showroom
    pub fn list_for_showroom(&self, showroom_id: Uuid) -> Result<Vec<Show>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SHOW_COLUMNS} FROM shows s WHERE s.showroom_id = ?1 ORDER BY s.start_time"
        ))?;
        let shows = stmt
            .query_map(params![showroom_id.to_string()], show_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(shows)
    }

    /// Shows starting within `range` that still have at least one free seat at `now`
    #[instrument(skip(self))]
    pub fn list_open(&self, range: TimeRange, now: DateTime<Utc>) -> Result<Vec<Show>> {
        let sql = format!(
            "SELECT {SHOW_COLUMNS} FROM shows s
             WHERE s.start_time >= :start AND s.start_time < :end
               AND {free} > 0
             ORDER BY s.start_time, s.id",
            free = free_seat_count_sql(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let shows = stmt
            .query_map(
                named_params! {
                    ":start": format_datetime(range.start),
                    ":end": format_datetime(range.end),
                    ":now": format_datetime(now),
                },
                show_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(shows)
    }

    /// Open shows joined with movie and showroom details
    #[instrument(skip(self))]
    pub fn list_open_listings(
        &self,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<ShowListing>> {
        let sql = format!(
            "SELECT * FROM (
                SELECT s.id, m.title, m.rating, sr.name, s.start_time, s.end_time,
                       {free} AS free_seats
                FROM shows s
                JOIN movies m ON m.id = s.movie_id
                JOIN showrooms sr ON sr.id = s.showroom_id
                WHERE s.start_time >= :start AND s.start_time < :end
             )
             WHERE free_seats > 0
             ORDER BY start_time, id",
            free = free_seat_count_sql(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let listings = stmt
            .query_map(
                named_params! {
                    ":start": format_datetime(range.start),
                    ":end": format_datetime(range.end),
                    ":now": format_datetime(now),
                },
                |row| {
                    Ok(ShowListing {
                        show_id: parse_uuid(&row.get::<_, String>(0)?)?,
                        movie_title: row.get(1)?,
                        rating: row.get(2)?,
                        showroom_name: row.get(3)?,
                        start_time: parse_datetime(&row.get::<_, String>(4)?)?,
                        end_time: parse_datetime(&row.get::<_, String>(5)?)?,
                        free_seats: row.get(6)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(listings)
    }
}
