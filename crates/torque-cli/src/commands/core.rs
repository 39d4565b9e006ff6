//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `market_service` - Market data service over the configured providers
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use torque_core::{Database, HttpMarketFeeds, MarketConfig, MarketDataService};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Build the market data service from the provider config
pub fn market_service(db: Database) -> Result<MarketDataService<HttpMarketFeeds>> {
    let config = MarketConfig::load().context("Failed to load market provider config")?;
    let feeds = HttpMarketFeeds::from_config(&config).context("Failed to build HTTP client")?;
    Ok(MarketDataService::new(db, feeds, config))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let cars = db.count_cars().context("Failed to read catalog")?;
    println!("   Path: {}", db.path());
    println!("   Catalog: {} cars", cars);

    if db.is_encrypted().context("Failed to check encryption")? {
        println!("   🔒 Encryption: ENABLED");
    } else if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   ⚠️  Encryption: DISABLED (SQLCipher unavailable)");
    }

    let config = MarketConfig::load().context("Failed to load market provider config")?;
    for (name, endpoint) in [
        ("pricing", &config.pricing),
        ("resale", &config.resale),
        ("demand", &config.demand),
    ] {
        match endpoint.base_url.as_deref() {
            Some(url) => println!("   📡 {} provider: {}", name, url),
            None => println!("   💤 {} provider: not configured", name),
        }
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Load a catalog: torque cars import --file data/cars.sample.json");
    println!("  2. Point at providers: export TORQUE_PRICING_URL=https://...");
    println!("  3. Get recommendations: torque recommend --use family --family-size 5");

    Ok(())
}
