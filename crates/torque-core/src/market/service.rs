//! Market data service
//!
//! Serves stored market records, refreshing them from the upstream feeds when
//! they are missing or older than the staleness window.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::analysis::{compute_best_time_to_buy, compute_market_insights};
use super::providers::MarketFeeds;
use crate::config::MarketConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    BestTimeToBuy, Car, CarFilter, DealerInventory, DemandPoint, MarketData, MarketInsights,
    PreferenceVector, PriceTrendPoint, ResaleValue, ScoredCar,
};
use crate::recommend::recommend;

/// Outcome of a bulk refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Cars considered
    pub total: usize,
    pub refreshed: usize,
    /// Cars whose record could not be rebuilt (storage errors, deleted mid-run)
    pub failed: usize,
}

/// Market data and recommendations over the catalog
pub struct MarketDataService<F> {
    db: Database,
    feeds: Arc<F>,
    config: MarketConfig,
}

impl<F> Clone for MarketDataService<F> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            feeds: self.feeds.clone(),
            config: self.config.clone(),
        }
    }
}

impl<F: MarketFeeds + 'static> MarketDataService<F> {
    pub fn new(db: Database, feeds: F, config: MarketConfig) -> Self {
        Self {
            db,
            feeds: Arc::new(feeds),
            config,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Get the market record for a car, refreshing it first if it is missing
    /// or stale
    pub async fn get_market_data(&self, car_id: i64) -> Result<MarketData> {
        let car = self.require_car(car_id)?;

        match self.db.get_market_data(car_id) {
            Ok(Some(record))
                if !record
                    .market_insights
                    .is_stale(Utc::now(), self.config.stale_after()) =>
            {
                debug!(car_id, "Serving cached market data");
                return Ok(record);
            }
            Ok(Some(_)) => debug!(car_id, "Market data is stale"),
            Ok(None) => debug!(car_id, "No market data yet"),
            Err(Error::Json(e)) => {
                warn!(car_id, error = %e, "Stored market data unreadable, rebuilding");
            }
            Err(e) => return Err(e),
        }

        self.refresh_car(&car).await
    }

    /// Refetch every series for a car and replace its market record
    pub async fn refresh_market_data(&self, car_id: i64) -> Result<MarketData> {
        let car = self.require_car(car_id)?;
        self.refresh_car(&car).await
    }

    /// Refresh every car in the catalog
    ///
    /// Upstream failures only degrade individual series, so `failed` counts
    /// storage-level problems.
    pub async fn refresh_all_market_data(&self) -> Result<RefreshSummary> {
        let ids: Vec<i64> = self
            .db
            .list_cars(&CarFilter::default())?
            .into_iter()
            .map(|car| car.id)
            .collect();

        info!(count = ids.len(), "Refreshing market data for all cars");
        Ok(self.refresh_many(ids).await)
    }

    /// Refresh only cars whose record is missing or stale
    pub async fn refresh_stale_market_data(&self) -> Result<RefreshSummary> {
        let cutoff = Utc::now() - self.config.stale_after();
        let ids = self.db.list_cars_needing_market_refresh(cutoff)?;

        info!(count = ids.len(), "Refreshing stale market data");
        Ok(self.refresh_many(ids).await)
    }

    /// Top matches from the catalog for a buyer's preferences
    pub fn recommend_cars(&self, preferences: &PreferenceVector) -> Result<Vec<ScoredCar>> {
        preferences.validate()?;
        let catalog = self.db.list_cars(&CarFilter::default())?;
        Ok(recommend(preferences, &catalog))
    }

    // ------------------------------------------------------------------------
    // Stored series accessors (never refresh)
    // ------------------------------------------------------------------------

    pub fn price_trends(&self, car_id: i64) -> Result<Vec<PriceTrendPoint>> {
        Ok(self.stored_record(car_id)?.price_trends)
    }

    pub fn resale_values(&self, car_id: i64) -> Result<Vec<ResaleValue>> {
        Ok(self.stored_record(car_id)?.resale_values)
    }

    pub fn market_demand(&self, car_id: i64) -> Result<Vec<DemandPoint>> {
        Ok(self.stored_record(car_id)?.market_demand)
    }

    pub fn best_time_to_buy(&self, car_id: i64) -> Result<BestTimeToBuy> {
        Ok(self.stored_record(car_id)?.best_time_to_buy)
    }

    pub fn dealer_inventory(&self, car_id: i64) -> Result<Vec<DealerInventory>> {
        Ok(self.stored_record(car_id)?.dealer_inventory)
    }

    pub fn market_insights(&self, car_id: i64) -> Result<MarketInsights> {
        Ok(self.stored_record(car_id)?.market_insights)
    }

    fn stored_record(&self, car_id: i64) -> Result<MarketData> {
        self.db
            .get_market_data(car_id)?
            .ok_or_else(|| Error::NotFound(format!("Market data for car {}", car_id)))
    }

    fn require_car(&self, car_id: i64) -> Result<Car> {
        self.db
            .get_car(car_id)?
            .ok_or_else(|| Error::NotFound(format!("Car {}", car_id)))
    }

    async fn refresh_car(&self, car: &Car) -> Result<MarketData> {
        let (make, model, year) = (car.make.as_str(), car.model.as_str(), car.year);

        let (prices, resale, demand, dealers) = tokio::join!(
            self.feeds.fetch_price_trends(make, model, year),
            self.feeds.fetch_resale_values(make, model, year),
            self.feeds.fetch_market_demand(make, model, year),
            self.feeds.fetch_dealer_inventory(make, model, year),
        );

        let price_trends = or_empty(prices, "pricing", car.id);
        let resale_values = or_empty(resale, "resale", car.id);
        let market_demand = or_empty(demand, "demand", car.id);
        let dealer_inventory = or_empty(dealers, "dealer inventory", car.id);

        let now = Utc::now();
        let record = MarketData {
            car_id: car.id,
            make: car.make.clone(),
            model: car.model.clone(),
            year: car.year,
            best_time_to_buy: compute_best_time_to_buy(&price_trends),
            market_insights: compute_market_insights(&price_trends, &market_demand, now),
            price_trends,
            resale_values,
            market_demand,
            dealer_inventory,
            created_at: now,
            updated_at: now,
        };

        self.db.upsert_market_data(&record)?;

        info!(
            car_id = car.id,
            car = %car.display_name(),
            best_month = record.best_time_to_buy.month,
            trend = %record.market_insights.market_trend,
            "Market data refreshed"
        );

        // Read back so the caller sees the stored timestamps
        self.stored_record(car.id)
    }

    async fn refresh_many(&self, ids: Vec<i64>) -> RefreshSummary {
        let mut summary = RefreshSummary {
            total: ids.len(),
            ..Default::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_refreshes.max(1)));
        let mut tasks = JoinSet::new();

        for id in ids {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let service = self.clone();
            tasks.spawn(async move {
                let result = service.refresh_market_data(id).await;
                drop(permit);
                (id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => summary.refreshed += 1,
                Ok((car_id, Err(e))) => {
                    warn!(car_id, error = %e, "Market data refresh failed");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(error = %e, "Market data refresh task panicked");
                    summary.failed += 1;
                }
            }
        }

        info!(
            total = summary.total,
            refreshed = summary.refreshed,
            failed = summary.failed,
            "Bulk market data refresh complete"
        );
        summary
    }
}

/// Substitute an empty series for a failed feed
fn or_empty<T>(result: Result<Vec<T>>, feed: &str, car_id: i64) -> Vec<T> {
    match result {
        Ok(series) => series,
        Err(e) => {
            warn!(car_id, feed, error = %e, "Market feed unavailable, using empty series");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::market::StaticMarketFeeds;
    use crate::models::{
        CarType, CompetitivePosition, MarketTrend, NewCar, Specifications, Variant,
    };

    fn add_car(db: &Database, make: &str, model: &str, car_type: CarType, price: f64) -> i64 {
        db.insert_car(&NewCar {
            make: make.to_string(),
            model: model.to_string(),
            year: 2024,
            car_type,
            description: None,
            base_price: None,
            image_url: None,
            variants: vec![Variant {
                name: "Base".to_string(),
                price,
                specifications: Specifications {
                    seating_capacity: Some(5),
                    ..Default::default()
                },
            }],
        })
        .unwrap()
    }

    fn feeds() -> StaticMarketFeeds {
        let point = |month: u32, avg: f64| PriceTrendPoint {
            date: Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap(),
            average_price: avg,
            min_price: avg,
            max_price: avg,
            listings_count: 5,
        };
        StaticMarketFeeds {
            price_trends: vec![point(1, 20_000.0), point(1, 22_000.0), point(7, 30_000.0)],
            market_demand: vec![DemandPoint {
                date: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
                demand_score: 85.0,
                search_volume: 100,
                view_count: 50,
                inquiry_count: 5,
            }],
            ..Default::default()
        }
    }

    fn service(feeds: StaticMarketFeeds) -> MarketDataService<StaticMarketFeeds> {
        let db = Database::in_memory().unwrap();
        MarketDataService::new(db, feeds, MarketConfig::default())
    }

    #[tokio::test]
    async fn test_get_market_data_builds_missing_record() {
        let service = service(feeds());
        let id = add_car(service.db(), "Toyota", "RAV4", CarType::Suv, 30_000.0);

        let record = service.get_market_data(id).await.unwrap();
        assert_eq!(record.car_id, id);
        assert_eq!(record.best_time_to_buy.month, 1);
        assert_eq!(record.best_time_to_buy.discount_percentage, 30);
        assert_eq!(record.market_insights.market_trend, MarketTrend::Rising);
        assert_eq!(
            record.market_insights.competitive_position,
            CompetitivePosition::Strong
        );
        assert_eq!(service.db().count_market_records().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_market_data_unknown_car() {
        let service = service(feeds());
        assert!(matches!(
            service.get_market_data(404).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.refresh_market_data(404).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fresh_record_is_served_from_cache() {
        let service = service(feeds());
        let id = add_car(service.db(), "Toyota", "RAV4", CarType::Suv, 30_000.0);

        let mut record = service.refresh_market_data(id).await.unwrap();
        record.best_time_to_buy.month = 11;
        service.db().upsert_market_data(&record).unwrap();

        // Fresh: the tampered value comes back untouched
        let cached = service.get_market_data(id).await.unwrap();
        assert_eq!(cached.best_time_to_buy.month, 11);
    }

    #[tokio::test]
    async fn test_stale_record_is_refreshed() {
        let service = service(feeds());
        let id = add_car(service.db(), "Toyota", "RAV4", CarType::Suv, 30_000.0);

        let mut record = service.refresh_market_data(id).await.unwrap();
        record.best_time_to_buy.month = 11;
        record.market_insights.last_updated = Utc::now() - Duration::hours(25);
        service.db().upsert_market_data(&record).unwrap();

        let refreshed = service.get_market_data(id).await.unwrap();
        assert_eq!(refreshed.best_time_to_buy.month, 1);
        assert!(!refreshed
            .market_insights
            .is_stale(Utc::now(), Duration::hours(24)));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let service = service(feeds());
        let id = add_car(service.db(), "Toyota", "RAV4", CarType::Suv, 30_000.0);

        let first = service.refresh_market_data(id).await.unwrap();
        let second = service.refresh_market_data(id).await.unwrap();

        assert_eq!(first.price_trends, second.price_trends);
        assert_eq!(first.best_time_to_buy, second.best_time_to_buy);
        assert_eq!(
            first.market_insights.price_volatility,
            second.market_insights.price_volatility
        );
        assert_eq!(
            first.market_insights.market_trend,
            second.market_insights.market_trend
        );
        assert_eq!(service.db().count_market_records().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_feeds_degrade_to_defaults() {
        let service = service(StaticMarketFeeds::unavailable());
        let id = add_car(service.db(), "Toyota", "RAV4", CarType::Suv, 30_000.0);

        let record = service.refresh_market_data(id).await.unwrap();
        assert!(record.price_trends.is_empty());
        assert!(record.dealer_inventory.is_empty());
        assert_eq!(record.best_time_to_buy.month, 1);
        assert_eq!(record.best_time_to_buy.discount_percentage, 0);
        assert_eq!(record.market_insights.price_volatility, 0);
        assert_eq!(record.market_insights.market_trend, MarketTrend::Stable);
        assert_eq!(
            record.market_insights.competitive_position,
            CompetitivePosition::Moderate
        );
    }

    #[tokio::test]
    async fn test_one_failed_feed_keeps_the_others() {
        let mut partial = feeds();
        partial.fail_demand = true;
        let service = service(partial);
        let id = add_car(service.db(), "Toyota", "RAV4", CarType::Suv, 30_000.0);

        let record = service.refresh_market_data(id).await.unwrap();
        assert_eq!(record.price_trends.len(), 3);
        assert!(record.market_demand.is_empty());
        // Best month only needs prices
        assert_eq!(record.best_time_to_buy.discount_percentage, 30);
        // Insights need both series
        assert_eq!(record.market_insights.market_trend, MarketTrend::Stable);
    }

    #[tokio::test]
    async fn test_refresh_all() {
        let service = service(feeds());
        for i in 0..6 {
            add_car(
                service.db(),
                "Make",
                &format!("Model {}", i),
                CarType::Sedan,
                20_000.0,
            );
        }

        let summary = service.refresh_all_market_data().await.unwrap();
        assert_eq!(
            summary,
            RefreshSummary {
                total: 6,
                refreshed: 6,
                failed: 0
            }
        );
        assert_eq!(service.db().count_market_records().unwrap(), 6);

        // Nothing is stale right after a full refresh
        let summary = service.refresh_stale_market_data().await.unwrap();
        assert_eq!(summary.total, 0);
    }

    /// Pricing feed that records how many fetches overlap
    #[derive(Default)]
    struct CountingFeeds {
        in_flight: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MarketFeeds for CountingFeeds {
        async fn fetch_price_trends(
            &self,
            _: &str,
            _: &str,
            _: i32,
        ) -> Result<Vec<PriceTrendPoint>> {
            use std::sync::atomic::Ordering;

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn fetch_resale_values(&self, _: &str, _: &str, _: i32) -> Result<Vec<ResaleValue>> {
            Ok(Vec::new())
        }

        async fn fetch_market_demand(&self, _: &str, _: &str, _: i32) -> Result<Vec<DemandPoint>> {
            Ok(Vec::new())
        }

        async fn fetch_dealer_inventory(
            &self,
            _: &str,
            _: &str,
            _: i32,
        ) -> Result<Vec<DealerInventory>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_refresh_all_respects_concurrency_cap() {
        let db = Database::in_memory().unwrap();
        let config = MarketConfig {
            max_concurrent_refreshes: 2,
            ..Default::default()
        };
        let service = MarketDataService::new(db, CountingFeeds::default(), config);
        for i in 0..6 {
            add_car(
                service.db(),
                "Make",
                &format!("Model {}", i),
                CarType::Sedan,
                20_000.0,
            );
        }

        let summary = service.refresh_all_market_data().await.unwrap();
        assert_eq!(summary.refreshed, 6);

        let peak = service
            .feeds
            .peak
            .load(std::sync::atomic::Ordering::SeqCst);
        assert_eq!(peak, 2);
    }

    #[tokio::test]
    async fn test_accessors_require_stored_record() {
        let service = service(feeds());
        let id = add_car(service.db(), "Toyota", "RAV4", CarType::Suv, 30_000.0);

        assert!(matches!(service.price_trends(id), Err(Error::NotFound(_))));
        assert!(matches!(
            service.market_insights(id),
            Err(Error::NotFound(_))
        ));

        service.refresh_market_data(id).await.unwrap();
        assert_eq!(service.price_trends(id).unwrap().len(), 3);
        assert!(service.resale_values(id).unwrap().is_empty());
        assert_eq!(service.market_demand(id).unwrap().len(), 1);
        assert_eq!(service.best_time_to_buy(id).unwrap().month, 1);
        assert!(service.dealer_inventory(id).unwrap().is_empty());
        assert_eq!(
            service.market_insights(id).unwrap().competitive_position,
            CompetitivePosition::Strong
        );
    }

    #[tokio::test]
    async fn test_recommend_cars_from_catalog() {
        let service = service(feeds());
        add_car(service.db(), "Honda", "Civic", CarType::Sedan, 25_000.0);
        add_car(service.db(), "Toyota", "RAV4", CarType::Suv, 30_000.0);

        let prefs = PreferenceVector {
            budget: Some((20_000.0, 50_000.0)),
            primary_use: Some(crate::models::PrimaryUse::Family),
            ..Default::default()
        };
        let results = service.recommend_cars(&prefs).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].car.model, "RAV4");
        assert_eq!(results[0].match_score, 50);
        assert_eq!(results[1].match_score, 30);

        let invalid = PreferenceVector {
            budget: Some((50_000.0, 20_000.0)),
            ..Default::default()
        };
        assert!(matches!(
            service.recommend_cars(&invalid),
            Err(Error::InvalidData(_))
        ));
    }
}
