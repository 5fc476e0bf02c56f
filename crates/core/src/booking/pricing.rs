//! Pricing resolver

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::BookingService;
use crate::error::{Error, Result};
use crate::models::{round_currency, Pricing, SeatType};
use crate::storage::{PricingRepository, PricingStore, ShowRepository, ShowStore};

pub struct PricingResolver<'a> {
    svc: &'a BookingService,
}

impl<'a> PricingResolver<'a> {
    pub(super) fn new(svc: &'a BookingService) -> Self {
        Self { svc }
    }

    /// Charge for one seat of `seat_type` at `show_id`
    pub fn price_for(&self, show_id: Uuid, seat_type: &SeatType) -> Result<Decimal> {
        match self.svc.db.find_pricing_for_show(show_id)? {
            Some(pricing) => Ok(pricing.charge_for(seat_type)),
            None if self.svc.db.find_show(show_id)?.is_none() => Err(Error::UnknownShow(show_id)),
            None => Err(Error::NoPricingSet(show_id)),
        }
    }

    pub fn pricing_for(&self, show_id: Uuid) -> Result<Option<Pricing>> {
        self.svc.db.find_pricing_for_show(show_id)
    }

    /// Set (or replace) the base price and seat-type premiums of a show
    ///
    /// The base price is stored at cent precision.
    #[instrument(skip(self, premiums), fields(premium_types = premiums.len()))]
    pub fn set_pricing(
        &self,
        show_id: Uuid,
        price: Decimal,
        premiums: BTreeMap<SeatType, Decimal>,
    ) -> Result<Pricing> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(Error::Validation(format!("price must not be negative: {price}")));
        }
        if let Some((seat_type, pct)) = premiums
            .iter()
            .find(|(_, pct)| pct.is_sign_negative() && !pct.is_zero())
        {
            return Err(Error::Validation(format!(
                "premium for {seat_type} must not be negative: {pct}"
            )));
        }

        let price = round_currency(price);
        let premiums: BTreeMap<SeatType, Decimal> = premiums
            .into_iter()
            .map(|(seat_type, pct)| (seat_type.normalized(), pct))
            .collect();
        let pricing = self.svc.config.retry.run("set_pricing", || {
            self.svc.db.write(|conn| {
                ShowStore::new(conn)
                    .find_by_id(show_id)?
                    .ok_or(Error::UnknownShow(show_id))?;

                let store = PricingStore::new(conn);
                let id = store
                    .find_for_show(show_id)?
                    .map(|existing| existing.id)
                    .unwrap_or_else(Uuid::new_v4);
                let pricing = Pricing {
                    id,
                    show_id,
                    price,
                    premium_percentage_by_type: premiums.clone(),
                };
                store.upsert(&pricing)?;
                Ok(pricing)
            })
        })?;

        debug!(pricing_id = %pricing.id, %price, "Pricing set");
        Ok(pricing)
    }
}
