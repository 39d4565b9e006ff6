//! Recommendation command implementation

use anyhow::Result;
use torque_core::market::{MarketDataService, MarketFeeds};
use torque_core::models::PreferenceVector;

use super::truncate;

pub fn cmd_recommend<F: MarketFeeds + 'static>(
    service: &MarketDataService<F>,
    preferences: &PreferenceVector,
    json: bool,
) -> Result<()> {
    let results = service.recommend_cars(preferences)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No cars in the catalog yet. Import some with:");
        println!("  torque cars import --file cars.json");
        return Ok(());
    }

    println!();
    println!("🎯 Top Matches");
    println!("   ─────────────────────────────────────────────────────────────");

    for (rank, scored) in results.iter().enumerate() {
        println!(
            "   {}. {:30} {:>3}% match  (id {})",
            rank + 1,
            truncate(&scored.car.display_name(), 30),
            scored.match_score,
            scored.car.id
        );
        for reason in &scored.match_reasons {
            println!("        ✓ {}", reason);
        }
    }

    if results.iter().all(|r| r.match_score == 0) {
        println!();
        println!("   💡 Tip: add --use, --lifestyle or a budget to rank the catalog");
    }

    Ok(())
}
