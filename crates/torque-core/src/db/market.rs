//! Market data record operations

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::MarketData;

impl Database {
    /// Insert or replace the market record for a car
    ///
    /// The whole record is replaced in a single statement keyed by `car_id`,
    /// so readers never see a half-refreshed record. `created_at` survives
    /// replacement.
    pub fn upsert_market_data(&self, data: &MarketData) -> Result<()> {
        let conn = self.conn()?;

        let price_trends = serde_json::to_string(&data.price_trends)?;
        let resale_values = serde_json::to_string(&data.resale_values)?;
        let market_demand = serde_json::to_string(&data.market_demand)?;
        let dealer_inventory = serde_json::to_string(&data.dealer_inventory)?;
        let best_time = serde_json::to_string(&data.best_time_to_buy)?;
        let insights = serde_json::to_string(&data.market_insights)?;
        let last_updated = format_datetime(&data.market_insights.last_updated);
        let updated_at = format_datetime(&data.updated_at);

        conn.execute(
            r#"
            INSERT INTO market_data (
                car_id, make, model, year, price_trends, resale_values, market_demand,
                dealer_inventory, best_time_to_buy, market_insights, last_updated, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(car_id) DO UPDATE SET
                make = excluded.make,
                model = excluded.model,
                year = excluded.year,
                price_trends = excluded.price_trends,
                resale_values = excluded.resale_values,
                market_demand = excluded.market_demand,
                dealer_inventory = excluded.dealer_inventory,
                best_time_to_buy = excluded.best_time_to_buy,
                market_insights = excluded.market_insights,
                last_updated = excluded.last_updated,
                updated_at = excluded.updated_at
            "#,
            params![
                data.car_id,
                data.make,
                data.model,
                data.year,
                price_trends,
                resale_values,
                market_demand,
                dealer_inventory,
                best_time,
                insights,
                last_updated,
                updated_at
            ],
        )?;

        Ok(())
    }

    /// Get the stored market record for a car
    pub fn get_market_data(&self, car_id: i64) -> Result<Option<MarketData>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            r#"
            SELECT car_id, make, model, year, price_trends, resale_values, market_demand,
                   dealer_inventory, best_time_to_buy, market_insights, created_at, updated_at
            FROM market_data
            WHERE car_id = ?
            "#,
            params![car_id],
            |row| {
                Ok(MarketRow {
                    car_id: row.get(0)?,
                    make: row.get(1)?,
                    model: row.get(2)?,
                    year: row.get(3)?,
                    price_trends: row.get(4)?,
                    resale_values: row.get(5)?,
                    market_demand: row.get(6)?,
                    dealer_inventory: row.get(7)?,
                    best_time_to_buy: row.get(8)?,
                    market_insights: row.get(9)?,
                    created_at: row.get(10)?,
                    updated_at: row.get(11)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row.decode()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// IDs of cars whose market record was last updated before `cutoff`,
    /// plus cars with no market record at all
    pub fn list_cars_needing_market_refresh(&self, cutoff: DateTime<Utc>) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id
            FROM cars c
            LEFT JOIN market_data m ON m.car_id = c.id
            WHERE m.id IS NULL OR m.last_updated < ?
            ORDER BY c.id
            "#,
        )?;

        let ids = stmt
            .query_map(params![format_datetime(&cutoff)], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    /// Count stored market records
    pub fn count_market_records(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM market_data", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Raw column values of a `market_data` row, before JSON decoding
struct MarketRow {
    car_id: i64,
    make: String,
    model: String,
    year: i32,
    price_trends: String,
    resale_values: String,
    market_demand: String,
    dealer_inventory: String,
    best_time_to_buy: String,
    market_insights: String,
    created_at: String,
    updated_at: String,
}

impl MarketRow {
    /// Decode the JSON columns
    ///
    /// A record that can't be decoded is an error rather than silently
    /// defaulted; the service treats it like a missing record and refreshes.
    fn decode(self) -> Result<MarketData> {
        Ok(MarketData {
            car_id: self.car_id,
            make: self.make,
            model: self.model,
            year: self.year,
            price_trends: serde_json::from_str(&self.price_trends)?,
            resale_values: serde_json::from_str(&self.resale_values)?,
            market_demand: serde_json::from_str(&self.market_demand)?,
            dealer_inventory: serde_json::from_str(&self.dealer_inventory)?,
            best_time_to_buy: serde_json::from_str(&self.best_time_to_buy)?,
            market_insights: serde_json::from_str(&self.market_insights)?,
            created_at: parse_datetime(&self.created_at),
            updated_at: parse_datetime(&self.updated_at),
        })
    }
}
