//! Car catalog command implementations

use std::path::Path;

use anyhow::{Context, Result};
use torque_core::db::Database;
use torque_core::models::{CarFilter, NewCar};
use torque_core::recommend::format_dollars;

use super::truncate;

pub fn cmd_cars_list(db: &Database, filter: &CarFilter) -> Result<()> {
    let cars = db.list_cars(filter)?;

    if cars.is_empty() {
        println!("No cars found. Load a catalog with:");
        println!("  torque cars import --file cars.json");
        return Ok(());
    }

    println!();
    println!("🚗 Car Catalog ({} cars)", cars.len());
    println!("   ─────────────────────────────────────────────────────────────");

    for car in &cars {
        let price = car
            .reference_price()
            .map(format_dollars)
            .unwrap_or_else(|| "?".to_string());
        println!(
            "   {:>4} │ {:28} │ {:10} │ {:>9} │ {} variant(s)",
            car.id,
            truncate(&car.display_name(), 28),
            truncate(car.car_type.as_str(), 10),
            price,
            car.variants.len()
        );
    }

    Ok(())
}

pub fn cmd_cars_show(db: &Database, id: i64) -> Result<()> {
    let car = db
        .get_car(id)?
        .ok_or_else(|| anyhow::anyhow!("Car not found: {}", id))?;

    println!();
    println!("🚗 {} ({})", car.display_name(), car.car_type);
    if let Some(ref description) = car.description {
        println!("   {}", description);
    }
    if let Some(price) = car.base_price {
        println!("   Base price: {}", format_dollars(price));
    }

    for variant in &car.variants {
        let specs = &variant.specifications;
        println!();
        println!("   ▸ {} - {}", variant.name, format_dollars(variant.price));
        if let Some(ref engine) = specs.engine {
            println!("     Engine: {}", engine);
        }
        if let Some(ref fuel) = specs.fuel_type {
            println!("     Fuel: {}", fuel);
        }
        if let Some(ref mpg) = specs.mpg {
            println!("     MPG: {} city / {} highway", mpg.city, mpg.highway);
        }
        if let Some(seats) = specs.seating_capacity {
            println!("     Seats: {}", seats);
        }
        let features: Vec<&str> = specs
            .infotainment
            .iter()
            .chain(specs.comfort_features.iter())
            .map(String::as_str)
            .collect();
        if !features.is_empty() {
            println!("     Features: {}", features.join(", "));
        }
    }

    Ok(())
}

pub fn cmd_cars_import(db: &Database, file: &Path) -> Result<()> {
    println!("📥 Importing cars from {}...", file.display());

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let cars = NewCar::parse_catalog(&content).context("Invalid catalog file")?;
    tracing::debug!("Parsed {} cars from {}", cars.len(), file.display());

    let ids = db.import_cars(&cars).context("Failed to import cars")?;

    println!("✅ Imported {} cars", ids.len());
    if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
        println!("   IDs {} - {}", first, last);
    }

    Ok(())
}

pub fn cmd_cars_delete(db: &Database, id: i64) -> Result<()> {
    if db.delete_car(id)? {
        println!("🗑️  Deleted car {} (and its market data)", id);
        Ok(())
    } else {
        anyhow::bail!("Car not found: {}", id)
    }
}
