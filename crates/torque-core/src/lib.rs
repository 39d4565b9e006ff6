//! Torque Core Library
//!
//! Shared functionality for the Torque car information backend:
//! - Database access and migrations (car catalog, market data records)
//! - Market insight engine (best time to buy, volatility, trend, demand position)
//! - Pluggable upstream market data feeds (pricing, resale, demand/inventory)
//! - Market data service with staleness-driven refresh and scheduled updates
//! - Preference-based car recommendation scoring

pub mod config;
pub mod db;
pub mod error;
pub mod market;
pub mod models;
pub mod recommend;

/// Test utilities including mock market provider server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::MarketConfig;
pub use db::Database;
pub use error::{Error, Result};
pub use market::{
    compute_best_time_to_buy, compute_market_insights, HttpMarketFeeds, MarketDataService,
    MarketFeeds, RefreshSummary,
};
pub use recommend::{recommend, score};
