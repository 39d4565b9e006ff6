//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use torque_core::models::{Lifestyle, PrimaryUse};

/// Torque - Car market insights and recommendations
#[derive(Parser)]
#[command(name = "torque")]
#[command(about = "Car market insight and recommendation engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "torque.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TORQUE_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage the car catalog (list, show, import, delete)
    Cars {
        #[command(subcommand)]
        action: Option<CarsAction>,
    },

    /// Market data for a car (price history, best time to buy, insights)
    Market {
        #[command(subcommand)]
        action: MarketAction,
    },

    /// Recommend cars for a buyer's preferences
    Recommend {
        /// Lowest acceptable price
        #[arg(long, requires = "max_budget")]
        min_budget: Option<f64>,

        /// Highest acceptable price
        #[arg(long, requires = "min_budget")]
        max_budget: Option<f64>,

        /// Primary use: commuting, family, luxury, performance, adventure
        #[arg(long = "use")]
        primary_use: Option<PrimaryUse>,

        /// Preferred fuel type (e.g., Gasoline, Hybrid, Electric)
        #[arg(long)]
        fuel: Option<String>,

        /// Must-have feature (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Lifestyle: urban, suburban, rural, active, luxury
        #[arg(long)]
        lifestyle: Option<Lifestyle>,

        /// Number of people the car must seat
        #[arg(long)]
        family_size: Option<u32>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refresh market data on a schedule until interrupted
    ///
    /// Uses TORQUE_REFRESH_SCHEDULE (hours) unless --interval-hours is given.
    Watch {
        /// Hours between refreshes
        #[arg(long)]
        interval_hours: Option<u64>,

        /// Refresh once immediately instead of waiting a full interval
        #[arg(long)]
        now: bool,
    },
}

#[derive(Subcommand)]
pub enum CarsAction {
    /// List cars in the catalog
    List {
        /// Filter by make (case-insensitive)
        #[arg(long)]
        make: Option<String>,

        /// Filter by body style (Sedan, SUV, Truck, ...)
        #[arg(long = "type")]
        car_type: Option<String>,

        /// Minimum price
        #[arg(long)]
        min_price: Option<f64>,

        /// Maximum price
        #[arg(long)]
        max_price: Option<f64>,

        /// Model year
        #[arg(long)]
        year: Option<i32>,
    },

    /// Show a car with all its variants
    Show {
        /// Car ID
        id: i64,
    },

    /// Import cars from a JSON catalog file
    Import {
        /// JSON file containing an array of cars
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete a car and its market data
    Delete {
        /// Car ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum MarketAction {
    /// Show market data, refreshing it if missing or stale
    Show {
        /// Car ID
        car_id: i64,

        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refetch market data from the providers now
    Refresh {
        /// Car ID
        car_id: i64,
    },

    /// Refresh market data for every car in the catalog
    RefreshAll {
        /// Only refresh cars whose data is missing or stale
        #[arg(long)]
        stale_only: bool,
    },

    /// Show the best month to buy (from stored data)
    BestTime {
        /// Car ID
        car_id: i64,
    },

    /// Show volatility, trend and competitive position (from stored data)
    Insights {
        /// Car ID
        car_id: i64,
    },

    /// Print one stored series as JSON
    Series {
        /// Car ID
        car_id: i64,

        /// Which series to print
        #[arg(value_enum)]
        kind: SeriesKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeriesKind {
    Prices,
    Resale,
    Demand,
    Dealers,
}
