//! Pricing storage operations

use std::collections::BTreeMap;

use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_decimal, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Pricing, SeatType};

pub struct PricingStore<'a> {
    conn: &'a Connection,
}

impl<'a> PricingStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace the pricing of a show
    ///
    /// The row id of an existing pricing is kept.
    #[instrument(skip(self, pricing), fields(show_id = %pricing.show_id))]
    pub fn upsert(&self, pricing: &Pricing) -> Result<()> {
        let premiums = serde_json::to_string(&pricing.premium_percentage_by_type)?;
        self.conn.execute(
            "INSERT INTO pricing (id, show_id, price, premium_percentage_by_type)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(show_id) DO UPDATE SET
                price = excluded.price,
                premium_percentage_by_type = excluded.premium_percentage_by_type",
            params![
                pricing.id.to_string(),
                pricing.show_id.to_string(),
                pricing.price.to_string(),
                premiums,
            ],
        )?;
        Ok(())
    }

    /// Pricing of a show, if any
    pub fn find_for_show(&self, show_id: Uuid) -> Result<Option<Pricing>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, show_id, price, premium_percentage_by_type FROM pricing WHERE show_id = ?1",
                params![show_id.to_string()],
                |row| {
                    Ok((
                        parse_uuid(&row.get::<_, String>(0)?)?,
                        parse_uuid(&row.get::<_, String>(1)?)?,
                        parse_decimal(&row.get::<_, String>(2)?)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, show_id, price, premiums_json)) = row else {
            return Ok(None);
        };
        let premium_percentage_by_type: BTreeMap<SeatType, Decimal> =
            serde_json::from_str(&premiums_json)?;

        Ok(Some(Pricing {
            id,
            show_id,
            price,
            premium_percentage_by_type,
        }))
    }
}
