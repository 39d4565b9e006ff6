//! Torque CLI - Car market insights and recommendations
//!
//! Usage:
//!   torque init                        Initialize database
//!   torque cars import --file cars.json  Load a car catalog
//!   torque market show 1               Market data for car 1
//!   torque recommend --use family      Recommend cars

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use torque_core::models::{CarFilter, CarType, PreferenceVector};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Cars { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_cars_list(&db, &CarFilter::default()),
                Some(CarsAction::List {
                    make,
                    car_type,
                    min_price,
                    max_price,
                    year,
                }) => {
                    let filter = CarFilter {
                        make,
                        car_type: car_type.map(CarType::from),
                        min_price,
                        max_price,
                        year,
                    };
                    commands::cmd_cars_list(&db, &filter)
                }
                Some(CarsAction::Show { id }) => commands::cmd_cars_show(&db, id),
                Some(CarsAction::Import { file }) => commands::cmd_cars_import(&db, &file),
                Some(CarsAction::Delete { id }) => commands::cmd_cars_delete(&db, id),
            }
        }
        Commands::Market { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let service = commands::market_service(db)?;
            match action {
                MarketAction::Show { car_id, json } => {
                    commands::cmd_market_show(&service, car_id, json).await
                }
                MarketAction::Refresh { car_id } => {
                    commands::cmd_market_refresh(&service, car_id).await
                }
                MarketAction::RefreshAll { stale_only } => {
                    commands::cmd_market_refresh_all(&service, stale_only).await
                }
                MarketAction::BestTime { car_id } => {
                    commands::cmd_market_best_time(&service, car_id)
                }
                MarketAction::Insights { car_id } => {
                    commands::cmd_market_insights(&service, car_id)
                }
                MarketAction::Series { car_id, kind } => {
                    commands::cmd_market_series(&service, car_id, kind)
                }
            }
        }
        Commands::Recommend {
            min_budget,
            max_budget,
            primary_use,
            fuel,
            features,
            lifestyle,
            family_size,
            json,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let service = commands::market_service(db)?;
            let preferences = PreferenceVector {
                budget: min_budget.zip(max_budget),
                primary_use,
                fuel_preference: fuel.filter(|f| !f.trim().is_empty()),
                must_have_features: features,
                lifestyle,
                family_size,
            };
            commands::cmd_recommend(&service, &preferences, json)
        }
        Commands::Watch {
            interval_hours,
            now,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let service = commands::market_service(db)?;
            commands::cmd_watch(service, interval_hours, now).await
        }
    }
}
