//! Per-show pricing model

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SeatType;

/// Minor-unit precision of every charged amount
pub const CURRENCY_SCALE: u32 = 2;

/// Base price of a show plus percentage premiums per seat type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub id: Uuid,
    pub show_id: Uuid,
    pub price: Decimal,
    /// Missing seat types carry no premium
    pub premium_percentage_by_type: BTreeMap<SeatType, Decimal>,
}

impl Pricing {
    pub fn new(show_id: Uuid, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            show_id,
            price,
            premium_percentage_by_type: BTreeMap::new(),
        }
    }

    pub fn with_premium(mut self, seat_type: SeatType, percentage: Decimal) -> Self {
        self.premium_percentage_by_type
            .insert(seat_type.normalized(), percentage);
        self
    }

    pub fn premium_for(&self, seat_type: &SeatType) -> Decimal {
        self.premium_percentage_by_type
            .get(&seat_type.normalized())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// `price * (1 + premium / 100)`, rounded half-to-even once at the end
    pub fn charge_for(&self, seat_type: &SeatType) -> Decimal {
        let multiplier = Decimal::ONE + self.premium_for(seat_type) / Decimal::ONE_HUNDRED;
        round_currency(self.price * multiplier)
    }
}

/// Round to cents with banker's rounding
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointNearestEven)
}
