//! Read-side projections for browsing and tickets

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ReservationState, SeatType};

/// An open show with enough context to render a schedule row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowListing {
    pub show_id: Uuid,
    pub movie_title: String,
    pub rating: String,
    pub showroom_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub free_seats: u32,
}

/// What a customer sees on their ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub reservation_id: Uuid,
    pub movie_title: String,
    pub showroom_name: String,
    pub seat_number: String,
    pub seat_type: SeatType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: Decimal,
    pub state: ReservationState,
}
