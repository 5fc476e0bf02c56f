//! Reservation model - the (show, seat) exclusivity unit

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reservation lifecycle
///
/// `Held -> Confirmed | Released`, `Confirmed -> Released`. `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationState {
    /// Temporary, until `expires_at`
    Held,
    /// Paid
    Confirmed,
    /// Seat returned to the pool
    Released,
}

impl ReservationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Held => "held",
            ReservationState::Confirmed => "confirmed",
            ReservationState::Released => "released",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "held" => Some(ReservationState::Held),
            "confirmed" => Some(ReservationState::Confirmed),
            "released" => Some(ReservationState::Released),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: ReservationState) -> bool {
        matches!(
            (self, next),
            (ReservationState::Held, ReservationState::Confirmed)
                | (ReservationState::Held, ReservationState::Released)
                | (ReservationState::Confirmed, ReservationState::Released)
        )
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a reservation was released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    Expired,
    Cancelled,
    PaymentFailed,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::Expired => "expired",
            ReleaseReason::Cancelled => "cancelled",
            ReleaseReason::PaymentFailed => "payment_failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "expired" => Some(ReleaseReason::Expired),
            "cancelled" => Some(ReleaseReason::Cancelled),
            "payment_failed" => Some(ReleaseReason::PaymentFailed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub show_id: Uuid,
    pub seat_id: Uuid,
    /// Opaque caller handle (session, user id, checkout id)
    pub requester: String,
    pub state: ReservationState,
    /// Charge resolved when the hold was taken
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub release_reason: Option<ReleaseReason>,
}

impl Reservation {
    /// A fresh hold
    pub fn held(
        show_id: Uuid,
        seat_id: Uuid,
        requester: String,
        price: Decimal,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            show_id,
            seat_id,
            requester,
            state: ReservationState::Held,
            price,
            created_at: now,
            expires_at: now + ttl,
            confirmed_at: None,
            released_at: None,
            release_reason: None,
        }
    }

    /// A hold whose expiry is at or before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.state == ReservationState::Held && self.expires_at <= now
    }

    /// Confirmed, or held and not yet expired
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            ReservationState::Confirmed => true,
            ReservationState::Held => now < self.expires_at,
            ReservationState::Released => false,
        }
    }
}
