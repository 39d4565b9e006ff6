//! Integration tests for torque-core
//!
//! These tests exercise the full catalog import → market refresh → recommend
//! workflow against a mock market data provider over HTTP.

use chrono::{Datelike, Duration, Utc};
use torque_core::{
    config::ProviderEndpoint,
    db::Database,
    market::{HttpMarketFeeds, MarketDataService},
    models::{CompetitivePosition, MarketTrend, NewCar, PreferenceVector},
    test_utils::{MockMarketServer, UNKNOWN_MAKE},
    Error, MarketConfig,
};

fn sample_catalog() -> Vec<NewCar> {
    NewCar::parse_catalog(include_str!("../../../data/cars.sample.json"))
        .expect("sample catalog should parse")
}

fn seeded_db() -> (Database, Vec<i64>) {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let ids = db.import_cars(&sample_catalog()).expect("import failed");
    (db, ids)
}

fn http_service(db: Database, config: MarketConfig) -> MarketDataService<HttpMarketFeeds> {
    let feeds = HttpMarketFeeds::from_config(&config).expect("Failed to build feeds");
    MarketDataService::new(db, feeds, config)
}

// =============================================================================
// Market Data Workflow
// =============================================================================

#[tokio::test]
async fn test_market_data_from_http_providers() {
    let server = MockMarketServer::start().await;
    let (db, ids) = seeded_db();
    let service = http_service(db, server.market_config());

    let record = service.get_market_data(ids[0]).await.unwrap();

    assert_eq!(record.make, "Toyota");
    assert_eq!(record.model, "Camry");
    assert_eq!(record.price_trends.len(), 3);
    assert_eq!(record.price_trends[0].date.month(), 1);
    assert_eq!(record.resale_values.len(), 2);
    assert_eq!(record.resale_values[0].predicted_value, 24_500.0);
    assert_eq!(record.resale_values[0].factors.len(), 2);
    assert!(record.resale_values[1].factors.is_empty());
    assert_eq!(record.market_demand.len(), 2);
    assert_eq!(record.dealer_inventory.len(), 1);
    let dealer = &record.dealer_inventory[0];
    assert_eq!(dealer.dealer_id, "D-100");
    assert_eq!(dealer.dealer_name, "Downtown Motors");
    assert_eq!(dealer.location.city.as_deref(), Some("Portland"));
    assert_eq!(dealer.location.zip_code.as_deref(), Some("97201"));

    // Jan mean 21,000 vs Jul 30,000
    assert_eq!(record.best_time_to_buy.month, 1);
    assert_eq!(record.best_time_to_buy.discount_percentage, 30);
    assert_eq!(
        record.best_time_to_buy.reason,
        "Historically lowest prices in January"
    );

    assert_eq!(record.market_insights.market_trend, MarketTrend::Rising);
    assert_eq!(
        record.market_insights.competitive_position,
        CompetitivePosition::Strong
    );
    assert_eq!(record.market_insights.price_volatility, 18);

    // Four feeds, one request each
    assert_eq!(server.request_count(), 4);
}

#[tokio::test]
async fn test_cached_record_skips_providers() {
    let server = MockMarketServer::start().await;
    let (db, ids) = seeded_db();
    let service = http_service(db, server.market_config());

    service.get_market_data(ids[0]).await.unwrap();
    service.get_market_data(ids[0]).await.unwrap();
    assert_eq!(server.request_count(), 4);

    service.refresh_market_data(ids[0]).await.unwrap();
    assert_eq!(server.request_count(), 8);
}

#[tokio::test]
async fn test_stale_record_refetched() {
    let server = MockMarketServer::start().await;
    let (db, ids) = seeded_db();
    let service = http_service(db.clone(), server.market_config());

    let mut record = service.get_market_data(ids[0]).await.unwrap();
    record.market_insights.last_updated = Utc::now() - Duration::hours(30);
    db.upsert_market_data(&record).unwrap();

    let refreshed = service.get_market_data(ids[0]).await.unwrap();
    assert_eq!(server.request_count(), 8);
    assert!(refreshed.market_insights.last_updated > record.market_insights.last_updated);
}

#[tokio::test]
async fn test_failing_providers_degrade_to_defaults() {
    let server = MockMarketServer::start_failing().await;
    let (db, ids) = seeded_db();
    let service = http_service(db, server.market_config());

    let record = service.get_market_data(ids[0]).await.unwrap();
    assert!(record.price_trends.is_empty());
    assert!(record.resale_values.is_empty());
    assert!(record.market_demand.is_empty());
    assert!(record.dealer_inventory.is_empty());
    assert_eq!(record.best_time_to_buy.month, 1);
    assert_eq!(
        record.best_time_to_buy.reason,
        "Insufficient data to determine best time to buy"
    );
    assert_eq!(record.market_insights.price_volatility, 0);
    assert_eq!(record.market_insights.market_trend, MarketTrend::Stable);
    assert_eq!(
        record.market_insights.competitive_position,
        CompetitivePosition::Moderate
    );
}

#[tokio::test]
async fn test_one_provider_down() {
    let healthy = MockMarketServer::start().await;
    let down = MockMarketServer::start_failing().await;
    let (db, ids) = seeded_db();

    let mut config = healthy.market_config();
    config.demand = ProviderEndpoint {
        base_url: Some(down.url()),
        api_key: None,
    };
    let service = http_service(db, config);

    let record = service.refresh_market_data(ids[0]).await.unwrap();
    assert_eq!(record.price_trends.len(), 3);
    assert_eq!(record.resale_values.len(), 2);
    assert!(record.market_demand.is_empty());
    assert!(record.dealer_inventory.is_empty());
    assert_eq!(record.best_time_to_buy.discount_percentage, 30);
    assert_eq!(record.market_insights.market_trend, MarketTrend::Stable);
}

#[tokio::test]
async fn test_api_key_forwarded() {
    let server = MockMarketServer::start_with_api_key("s3cret").await;
    let (db, ids) = seeded_db();

    let mut config = server.market_config();
    config.pricing.api_key = Some("s3cret".to_string());
    let service = http_service(db, config);

    let record = service.refresh_market_data(ids[0]).await.unwrap();
    // Only the pricing provider had the key
    assert_eq!(record.price_trends.len(), 3);
    assert!(record.resale_values.is_empty());
}

#[tokio::test]
async fn test_unknown_make_has_no_history() {
    let server = MockMarketServer::start().await;
    let db = Database::in_memory().unwrap();
    let mut car = sample_catalog().remove(0);
    car.make = UNKNOWN_MAKE.to_string();
    let id = db.insert_car(&car).unwrap();
    let service = http_service(db, server.market_config());

    let record = service.get_market_data(id).await.unwrap();
    assert!(record.price_trends.is_empty());
    assert_eq!(record.best_time_to_buy.discount_percentage, 0);
}

#[tokio::test]
async fn test_missing_car_is_not_found() {
    let server = MockMarketServer::start().await;
    let (db, _) = seeded_db();
    let service = http_service(db, server.market_config());

    assert!(matches!(
        service.get_market_data(9_999).await,
        Err(Error::NotFound(_))
    ));
    // Nothing was fetched for a car that doesn't exist
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn test_refresh_all_catalog() {
    let server = MockMarketServer::start().await;
    let (db, ids) = seeded_db();
    let mut config = server.market_config();
    config.max_concurrent_refreshes = 2;
    let service = http_service(db.clone(), config);

    let summary = service.refresh_all_market_data().await.unwrap();
    assert_eq!(summary.total, ids.len());
    assert_eq!(summary.refreshed, ids.len());
    assert_eq!(summary.failed, 0);
    assert_eq!(db.count_market_records().unwrap() as usize, ids.len());
    assert_eq!(server.request_count(), ids.len() * 4);

    for id in ids {
        assert_eq!(service.best_time_to_buy(id).unwrap().month, 1);
    }
}

#[tokio::test]
async fn test_deleting_car_drops_market_record() {
    let server = MockMarketServer::start().await;
    let (db, ids) = seeded_db();
    let service = http_service(db.clone(), server.market_config());

    service.refresh_market_data(ids[1]).await.unwrap();
    assert!(service.market_insights(ids[1]).is_ok());

    db.delete_car(ids[1]).unwrap();
    assert!(matches!(
        service.market_insights(ids[1]),
        Err(Error::NotFound(_))
    ));
}

// =============================================================================
// Recommendation Workflow
// =============================================================================

#[tokio::test]
async fn test_recommend_family_buyer() {
    let (db, _) = seeded_db();
    let service = http_service(db, MarketConfig::default());

    let prefs: PreferenceVector = serde_json::from_str(
        r#"{
            "budget": [20000, 50000],
            "primaryUse": "family",
            "fuelPreference": "",
            "mustHaveFeatures": ["Heated Seats"],
            "lifestyle": "suburban",
            "familySize": 6
        }"#,
    )
    .unwrap();

    let results = service.recommend_cars(&prefs).unwrap();
    assert_eq!(results.len(), 5);
    assert!(results
        .windows(2)
        .all(|w| w[0].match_score >= w[1].match_score));

    // Highlander: budget 30 + family 20 + heated seats 5 + suburban 15 + 8 seats 20
    let top = &results[0];
    assert_eq!(top.car.model, "Highlander");
    assert_eq!(top.match_score, 90);
    assert_eq!(top.match_reasons.len(), 5);
    assert_eq!(top.match_reasons[4], "Seats 8 people comfortably");

    // Pacifica: budget 30 + family 20 + heated seats 5 + 7 seats 20
    assert_eq!(results[1].car.model, "Pacifica");
    assert_eq!(results[1].match_score, 75);

    let json = serde_json::to_value(top).unwrap();
    assert_eq!(json["matchScore"], 90);
    assert_eq!(json["type"], "SUV");
}

#[tokio::test]
async fn test_recommend_with_empty_preferences() {
    let (db, _) = seeded_db();
    let service = http_service(db, MarketConfig::default());

    let results = service
        .recommend_cars(&PreferenceVector::default())
        .unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.match_score == 0));
    // Ties keep catalog order
    assert_eq!(results[0].car.model, "Camry");
    assert_eq!(results[4].car.model, "F-150");
}
