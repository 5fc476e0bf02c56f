//! Showroom and seat models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A screening room with a fixed seating plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Showroom {
    pub id: Uuid,
    pub name: String,
}

impl Showroom {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
        }
    }
}

/// Seat category used for premium pricing
///
/// Open-ended: unknown codes round-trip through `Other`. Build custom types
/// with [`SeatType::other`] so the code is normalised the same way stored
/// codes are; a hand-built `Other("Balcony")` is normalised on lookup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SeatType {
    Standard,
    Vip,
    Couple,
    SuperVip,
    Other(String),
}

impl SeatType {
    pub fn as_str(&self) -> &str {
        match self {
            SeatType::Standard => "standard",
            SeatType::Vip => "vip",
            SeatType::Couple => "couple",
            SeatType::SuperVip => "super_vip",
            SeatType::Other(code) => code,
        }
    }

    /// Custom seat type from a free-form code, e.g. `"Balcony"`.
    /// Codes of the built-in types map to their variant.
    pub fn other(code: &str) -> Self {
        Self::parse(code)
    }

    /// Canonical form: lowercase trimmed code, built-in codes as variants
    pub fn normalized(&self) -> Self {
        match self {
            SeatType::Other(code) => Self::parse(code),
            known => known.clone(),
        }
    }

    /// Parse a stored code. Case-insensitive; never fails.
    pub fn parse(code: &str) -> Self {
        let code = code.trim().to_ascii_lowercase();
        match code.as_str() {
            "standard" => SeatType::Standard,
            "vip" => SeatType::Vip,
            "couple" => SeatType::Couple,
            "super_vip" => SeatType::SuperVip,
            _ => SeatType::Other(code),
        }
    }
}

impl From<String> for SeatType {
    fn from(code: String) -> Self {
        SeatType::parse(&code)
    }
}

impl From<SeatType> for String {
    fn from(seat_type: SeatType) -> Self {
        seat_type.as_str().to_string()
    }
}

impl std::fmt::Display for SeatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A physical seat, reused by every show in its showroom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub showroom_id: Uuid,
    /// Label printed on the ticket, e.g. "F12"
    pub seat_number: String,
    pub seat_type: SeatType,
}

/// Seat definition supplied when a showroom is set up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSeat {
    pub seat_number: String,
    pub seat_type: SeatType,
}

impl NewSeat {
    pub fn new(seat_number: impl Into<String>, seat_type: SeatType) -> Self {
        Self {
            seat_number: seat_number.into(),
            seat_type,
        }
    }

    pub fn standard(seat_number: impl Into<String>) -> Self {
        Self::new(seat_number, SeatType::Standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_type_codes() {
        assert_eq!(SeatType::parse("VIP"), SeatType::Vip);
        assert_eq!(SeatType::parse("super_vip"), SeatType::SuperVip);
        assert_eq!(SeatType::parse("recliner"), SeatType::Other("recliner".to_string()));
        assert_eq!(SeatType::Other("recliner".to_string()).as_str(), "recliner");
    }

    #[test]
    fn test_custom_codes_normalised() {
        assert_eq!(SeatType::other(" Balcony "), SeatType::Other("balcony".to_string()));
        assert_eq!(SeatType::other("VIP"), SeatType::Vip);
        assert_eq!(SeatType::Other("Vip".to_string()).normalized(), SeatType::Vip);
        assert_eq!(
            SeatType::Other("Balcony".to_string()).normalized(),
            SeatType::other("balcony")
        );
    }

    #[test]
    fn test_seat_type_serializes_as_code() {
        let json = serde_json::to_string(&SeatType::Couple).unwrap();
        assert_eq!(json, "\"couple\"");
        let back: SeatType = serde_json::from_str("\"box\"").unwrap();
        assert_eq!(back, SeatType::Other("box".to_string()));
    }
}
