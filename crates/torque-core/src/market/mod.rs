//! Market Insight Engine
//!
//! Fetches price, resale, demand and dealer inventory series for a car from
//! upstream providers, derives buying signals from them, and keeps one
//! market record per car in the database.
//!
//! - **analysis** - Pure signal computation (best month to buy, volatility, trend)
//! - **providers** - Upstream feeds (`MarketFeeds` trait, HTTP implementation)
//! - **service** - Cache-or-refresh orchestration over the database
//! - **scheduler** - Periodic bulk refresh
//!
//! ## Usage
//!
//! ```rust,ignore
//! use torque_core::{Database, HttpMarketFeeds, MarketConfig, MarketDataService};
//!
//! let config = MarketConfig::load()?;
//! let feeds = HttpMarketFeeds::from_config(&config)?;
//! let service = MarketDataService::new(db, feeds, config);
//! let record = service.get_market_data(car_id).await?;
//! ```

pub mod analysis;
pub mod providers;
pub mod scheduler;
pub mod service;

pub use analysis::{compute_best_time_to_buy, compute_market_insights};
pub use providers::{HttpMarketFeeds, MarketFeeds, StaticMarketFeeds};
pub use scheduler::{start_market_scheduler, MarketScheduleConfig};
pub use service::{MarketDataService, RefreshSummary};
