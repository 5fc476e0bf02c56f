//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial cinema schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS movies (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL CHECK (length(trim(title)) > 0),
                duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
                rating TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS showrooms (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            -- Seats are defined once per showroom and shared by all its shows
            CREATE TABLE IF NOT EXISTS seats (
                id TEXT PRIMARY KEY,
                showroom_id TEXT NOT NULL,
                seat_number TEXT NOT NULL,
                seat_type TEXT NOT NULL,
                FOREIGN KEY (showroom_id) REFERENCES showrooms(id),
                UNIQUE(showroom_id, seat_number)
            );

            CREATE TABLE IF NOT EXISTS shows (
                id TEXT PRIMARY KEY,
                movie_id TEXT NOT NULL,
                showroom_id TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                CHECK (end_time > start_time),
                FOREIGN KEY (movie_id) REFERENCES movies(id),
                FOREIGN KEY (showroom_id) REFERENCES showrooms(id)
            );

            -- One pricing row per show; premiums are a JSON object keyed by seat type
            CREATE TABLE IF NOT EXISTS pricing (
                id TEXT PRIMARY KEY,
                show_id TEXT NOT NULL UNIQUE,
                price TEXT NOT NULL,
                premium_percentage_by_type TEXT NOT NULL DEFAULT '{}',
                FOREIGN KEY (show_id) REFERENCES shows(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS reservations (
                id TEXT PRIMARY KEY,
                show_id TEXT NOT NULL,
                seat_id TEXT NOT NULL,
                requester TEXT NOT NULL,
                state TEXT NOT NULL CHECK (state IN ('held', 'confirmed', 'released')),
                price TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                confirmed_at TEXT,
                released_at TEXT,
                release_reason TEXT,
                FOREIGN KEY (show_id) REFERENCES shows(id),
                FOREIGN KEY (seat_id) REFERENCES seats(id)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add active-slot constraint and query indexes",
        sql: r#"
            -- At most one non-released reservation per (show, seat)
            CREATE UNIQUE INDEX IF NOT EXISTS ux_reservations_active_slot
                ON reservations(show_id, seat_id) WHERE state <> 'released';

            -- Sweep and availability lookups
            CREATE INDEX IF NOT EXISTS idx_reservations_state_expires
                ON reservations(state, expires_at);
            CREATE INDEX IF NOT EXISTS idx_reservations_show ON reservations(show_id);

            -- Overlap check and schedule browsing
            CREATE INDEX IF NOT EXISTS idx_shows_showroom_start ON shows(showroom_id, start_time);
            CREATE INDEX IF NOT EXISTS idx_shows_start ON shows(start_time);

            CREATE INDEX IF NOT EXISTS idx_seats_showroom ON seats(showroom_id);
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
///
/// Holds the write lock for the whole run so several processes opening the
/// same file at once apply each migration exactly once.
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    init_migrations_table(&tx)?;

    let current_version = get_current_version(&tx)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            tx.execute_batch(migration.sql)?;
            record_migration(&tx, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(&tx)?;
    tx.commit()?;

    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}
