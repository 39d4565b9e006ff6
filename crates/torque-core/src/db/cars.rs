//! Car catalog operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Car, CarFilter, CarType, NewCar, Variant};

const CAR_COLUMNS: &str =
    "id, make, model, year, car_type, description, base_price, image_url, variants, created_at";

impl Database {
    /// Insert a car into the catalog
    pub fn insert_car(&self, car: &NewCar) -> Result<i64> {
        let conn = self.conn()?;
        let variants_json = serde_json::to_string(&car.variants)?;

        conn.execute(
            r#"
            INSERT INTO cars (make, model, year, car_type, description, base_price, image_url, variants)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                car.make,
                car.model,
                car.year,
                car.car_type.as_str(),
                car.description,
                car.base_price,
                car.image_url,
                variants_json
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Insert a batch of cars in one transaction
    ///
    /// Either every car is inserted or none are. Returns the new IDs in input order.
    pub fn import_cars(&self, cars: &[NewCar]) -> Result<Vec<i64>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(cars.len());

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO cars (make, model, year, car_type, description, base_price, image_url, variants)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for car in cars {
                let variants_json = serde_json::to_string(&car.variants)?;
                stmt.execute(params![
                    car.make,
                    car.model,
                    car.year,
                    car.car_type.as_str(),
                    car.description,
                    car.base_price,
                    car.image_url,
                    variants_json
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit()?;
        Ok(ids)
    }

    /// Get a car by ID
    pub fn get_car(&self, id: i64) -> Result<Option<Car>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM cars WHERE id = ?", CAR_COLUMNS);

        let result = conn.query_row(&sql, params![id], |row| self.row_to_car(row));

        match result {
            Ok(car) => Ok(Some(car)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List cars matching a filter
    ///
    /// Make, type and year are matched in SQL. The price bounds apply to the
    /// car's reference price, which lives inside the variants JSON, so they
    /// are applied after loading.
    pub fn list_cars(&self, filter: &CarFilter) -> Result<Vec<Car>> {
        let conn = self.conn()?;

        let mut conditions = Vec::new();
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref make) = filter.make {
            conditions.push("make = ? COLLATE NOCASE");
            query_params.push(Box::new(make.clone()));
        }
        if let Some(ref car_type) = filter.car_type {
            conditions.push("car_type = ? COLLATE NOCASE");
            query_params.push(Box::new(car_type.as_str().to_string()));
        }
        if let Some(year) = filter.year {
            conditions.push("year = ?");
            query_params.push(Box::new(year));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM cars {} ORDER BY id",
            CAR_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();
        let cars = stmt
            .query_map(param_refs.as_slice(), |row| self.row_to_car(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if filter.min_price.is_none() && filter.max_price.is_none() {
            return Ok(cars);
        }

        Ok(cars
            .into_iter()
            .filter(|car| match car.reference_price() {
                Some(price) => {
                    filter.min_price.map_or(true, |min| price >= min)
                        && filter.max_price.map_or(true, |max| price <= max)
                }
                None => false,
            })
            .collect())
    }

    /// Replace a car's catalog data
    pub fn update_car(&self, id: i64, car: &NewCar) -> Result<()> {
        let conn = self.conn()?;
        let variants_json = serde_json::to_string(&car.variants)?;

        let updated = conn.execute(
            r#"
            UPDATE cars
            SET make = ?, model = ?, year = ?, car_type = ?, description = ?,
                base_price = ?, image_url = ?, variants = ?
            WHERE id = ?
            "#,
            params![
                car.make,
                car.model,
                car.year,
                car.car_type.as_str(),
                car.description,
                car.base_price,
                car.image_url,
                variants_json,
                id
            ],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!("Car {}", id)));
        }
        Ok(())
    }

    /// Delete a car (its market record goes with it)
    ///
    /// Returns false if no such car existed.
    pub fn delete_car(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM cars WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    /// Count cars in the catalog
    pub fn count_cars(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cars", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_car(&self, row: &rusqlite::Row) -> rusqlite::Result<Car> {
        let car_type_str: String = row.get(4)?;
        let variants_json: String = row.get(8)?;
        let created_at_str: String = row.get(9)?;

        // A car whose variants can't be read is still listed; it just won't
        // match variant-based recommendation criteria.
        let variants: Vec<Variant> = serde_json::from_str(&variants_json).unwrap_or_default();

        Ok(Car {
            id: row.get(0)?,
            make: row.get(1)?,
            model: row.get(2)?,
            year: row.get(3)?,
            car_type: CarType::from(car_type_str),
            description: row.get(5)?,
            base_price: row.get(6)?,
            image_url: row.get(7)?,
            variants,
            created_at: parse_datetime(&created_at_str),
        })
    }
}
