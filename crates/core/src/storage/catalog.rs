//! Catalog storage operations (movies, showrooms, seats)

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_uuid, OptionalExt};
use crate::error::{is_unique_violation, Error, Result};
use crate::models::{Movie, Seat, SeatType, Showroom};

pub struct CatalogStore<'a> {
    conn: &'a Connection,
}

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        title: row.get(1)?,
        duration_minutes: row.get(2)?,
        rating: row.get(3)?,
    })
}

pub(crate) fn seat_from_row(row: &Row<'_>) -> rusqlite::Result<Seat> {
    Ok(Seat {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        showroom_id: parse_uuid(&row.get::<_, String>(1)?)?,
        seat_number: row.get(2)?,
        seat_type: SeatType::parse(&row.get::<_, String>(3)?),
    })
}

impl<'a> CatalogStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a movie
    #[instrument(skip(self, movie), fields(title = %movie.title))]
    pub fn create_movie(&self, movie: &Movie) -> Result<()> {
        self.conn.execute(
            "INSERT INTO movies (id, title, duration_minutes, rating) VALUES (?1, ?2, ?3, ?4)",
            params![
                movie.id.to_string(),
                movie.title,
                movie.duration_minutes,
                movie.rating,
            ],
        )?;
        Ok(())
    }

    /// Find movie by ID
    pub fn find_movie(&self, id: Uuid) -> Result<Option<Movie>> {
        let movie = self
            .conn
            .query_row(
                "SELECT id, title, duration_minutes, rating FROM movies WHERE id = ?1",
                params![id.to_string()],
                movie_from_row,
            )
            .optional()?;
        Ok(movie)
    }

    /// All movies ordered by title
    pub fn list_movies(&self) -> Result<Vec<Movie>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, duration_minutes, rating FROM movies ORDER BY title, id")?;
        let movies = stmt
            .query_map([], movie_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(movies)
    }

    /// Insert a showroom row and its seats
    ///
    /// Callers wrap this in a transaction so the seating plan lands atomically.
    #[instrument(skip(self, showroom, seats), fields(name = %showroom.name, seats = seats.len()))]
    pub fn create_showroom(&self, showroom: &Showroom, seats: &[Seat]) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO showrooms (id, name) VALUES (?1, ?2)",
                params![showroom.id.to_string(), showroom.name],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::DuplicateShowroom(showroom.name.clone())
                } else {
                    e.into()
                }
            })?;

        let mut stmt = self.conn.prepare(
            "INSERT INTO seats (id, showroom_id, seat_number, seat_type) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for seat in seats {
            stmt.execute(params![
                seat.id.to_string(),
                showroom.id.to_string(),
                seat.seat_number,
                seat.seat_type.as_str(),
            ])?;
        }
        Ok(())
    }

    /// Find showroom by ID
    pub fn find_showroom(&self, id: Uuid) -> Result<Option<Showroom>> {
        let showroom = self
            .conn
            .query_row(
                "SELECT id, name FROM showrooms WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(Showroom {
                        id: parse_uuid(&row.get::<_, String>(0)?)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(showroom)
    }

    /// Find seat by ID
    pub fn find_seat(&self, id: Uuid) -> Result<Option<Seat>> {
        let seat = self
            .conn
            .query_row(
                "SELECT id, showroom_id, seat_number, seat_type FROM seats WHERE id = ?1",
                params![id.to_string()],
                seat_from_row,
            )
            .optional()?;
        Ok(seat)
    }

    /// Seating plan of a showroom, ordered by seat number
    pub fn seats_for_showroom(&self, showroom_id: Uuid) -> Result<Vec<Seat>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, showroom_id, seat_number, seat_type FROM seats
             WHERE showroom_id = ?1 ORDER BY seat_number",
        )?;
        let seats = stmt
            .query_map(params![showroom_id.to_string()], seat_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(seats)
    }

    pub fn count_seats(&self, showroom_id: Uuid) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM seats WHERE showroom_id = ?1",
            params![showroom_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
