//! Background scheduler for automatic market data refreshes
//!
//! Enabled via environment variable:
//!
//! - `TORQUE_REFRESH_SCHEDULE`: Interval in hours (e.g., "24" for daily)
//!
//! Each run rebuilds the market record of every car in the catalog.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use super::providers::MarketFeeds;
use super::service::MarketDataService;

/// Environment variable holding the refresh interval in hours
pub const REFRESH_SCHEDULE_ENV: &str = "TORQUE_REFRESH_SCHEDULE";

/// Configuration for scheduled refreshes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketScheduleConfig {
    /// Interval between refreshes in hours
    pub interval_hours: u64,
    /// Also refresh once right away instead of waiting a full interval
    pub run_on_start: bool,
}

impl MarketScheduleConfig {
    /// Parse configuration from environment variables
    ///
    /// Returns None if scheduling is not configured (TORQUE_REFRESH_SCHEDULE not set)
    pub fn from_env() -> Option<Self> {
        let interval_hours: u64 = std::env::var(REFRESH_SCHEDULE_ENV)
            .ok()
            .and_then(|s| s.parse().ok())?;
        Self::every(interval_hours)
    }

    /// Schedule every `interval_hours`; 0 disables
    pub fn every(interval_hours: u64) -> Option<Self> {
        if interval_hours == 0 {
            warn!("Refresh interval is 0, scheduled market refresh disabled");
            return None;
        }
        Some(Self {
            interval_hours,
            run_on_start: false,
        })
    }

    fn period(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }
}

/// Start the market refresh scheduler as a background task
///
/// The task runs until the returned handle is aborted or the runtime shuts down.
pub fn start_market_scheduler<F>(
    service: MarketDataService<F>,
    config: MarketScheduleConfig,
) -> JoinHandle<()>
where
    F: MarketFeeds + 'static,
{
    info!(
        "Starting market refresh scheduler: every {} hours",
        config.interval_hours
    );

    tokio::spawn(async move {
        let mut ticker = interval(config.period());

        // The first tick fires immediately
        if !config.run_on_start {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;

            info!("Running scheduled market refresh...");

            match service.refresh_all_market_data().await {
                Ok(summary) => {
                    info!(
                        "Scheduled market refresh completed: {}/{} refreshed, {} failed",
                        summary.refreshed, summary.total, summary.failed
                    );
                }
                Err(e) => {
                    error!("Scheduled market refresh failed: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::StaticMarketFeeds;
    use crate::models::{CarType, NewCar};
    use crate::{Database, MarketConfig};

    #[test]
    fn test_zero_interval_disables() {
        assert!(MarketScheduleConfig::every(0).is_none());
        let config = MarketScheduleConfig::every(24).unwrap();
        assert_eq!(config.period(), Duration::from_secs(86_400));
        assert!(!config.run_on_start);
    }

    #[tokio::test]
    async fn test_run_on_start_refreshes_catalog() {
        let db = Database::in_memory().unwrap();
        db.insert_car(&NewCar {
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            year: 2024,
            car_type: CarType::Sedan,
            description: None,
            base_price: Some(27_000.0),
            image_url: None,
            variants: vec![],
        })
        .unwrap();

        let service = MarketDataService::new(
            db.clone(),
            StaticMarketFeeds::default(),
            MarketConfig::default(),
        );
        let mut config = MarketScheduleConfig::every(1).unwrap();
        config.run_on_start = true;

        let handle = start_market_scheduler(service, config);

        for _ in 0..100 {
            if db.count_market_records().unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(db.count_market_records().unwrap(), 1);
    }
}
