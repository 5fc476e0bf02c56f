//! Error types for Marquee Core

use rusqlite::ErrorCode;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown movie: {0}")]
    UnknownMovie(Uuid),

    #[error("Unknown showroom: {0}")]
    UnknownShowroom(Uuid),

    #[error("Unknown show: {0}")]
    UnknownShow(Uuid),

    #[error("Unknown seat: {0}")]
    UnknownSeat(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No pricing set for show {0}")]
    NoPricingSet(Uuid),

    #[error("Seat {seat_id} is already reserved for show {show_id}")]
    AlreadyReserved { show_id: Uuid, seat_id: Uuid },

    #[error("Show overlaps existing show {existing} in the same showroom")]
    OverlappingShow { existing: Uuid },

    #[error("Reservation {0} is already confirmed")]
    AlreadyConfirmed(Uuid),

    #[error("Reservation {0} is already released")]
    AlreadyReleased(Uuid),

    #[error("Showroom name already in use: {0}")]
    DuplicateShowroom(String),

    #[error("Hold {0} has expired")]
    Expired(Uuid),

    #[error("Invalid time window: end must be after start")]
    InvalidWindow,

    #[error("Seat {seat_id} does not belong to showroom {showroom_id}")]
    SeatNotInShowroom { seat_id: Uuid, showroom_id: Uuid },

    #[error("Hold TTL must be positive")]
    InvalidTtl,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage busy after {attempts} attempts")]
    Transient { attempts: u32 },
}

/// Coarse classification callers use to decide how to surface or retry a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown id reference
    NotFound,
    /// Lost a race or the target is in an incompatible state
    Conflict,
    /// A hold outlived its TTL
    Expired,
    /// Caller bug, never retried
    Validation,
    /// Storage contention, safe to re-run the operation
    Transient,
    /// Anything else (I/O, corrupt rows, config)
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownMovie(_)
            | Error::UnknownShowroom(_)
            | Error::UnknownShow(_)
            | Error::UnknownSeat(_)
            | Error::NotFound(_)
            | Error::NoPricingSet(_) => ErrorKind::NotFound,
            Error::AlreadyReserved { .. }
            | Error::OverlappingShow { .. }
            | Error::AlreadyConfirmed(_)
            | Error::AlreadyReleased(_)
            | Error::DuplicateShowroom(_) => ErrorKind::Conflict,
            Error::Expired(_) => ErrorKind::Expired,
            Error::InvalidWindow
            | Error::SeatNotInShowroom { .. }
            | Error::InvalidTtl
            | Error::Validation(_) => ErrorKind::Validation,
            Error::Transient { .. } => ErrorKind::Transient,
            Error::Database(e) if is_busy(e) => ErrorKind::Transient,
            Error::Database(_) | Error::Serialization(_) | Error::Io(_) | Error::Config(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// True when re-running the whole operation may succeed
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED: another connection holds the write lock
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

/// A UNIQUE (or partial UNIQUE index) violation
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
