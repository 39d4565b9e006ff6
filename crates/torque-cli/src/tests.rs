//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use chrono::{TimeZone, Utc};
use clap::Parser;
use torque_core::db::Database;
use torque_core::market::{MarketDataService, StaticMarketFeeds};
use torque_core::models::{
    CarFilter, CarType, DemandPoint, NewCar, PreferenceVector, PrimaryUse, PriceTrendPoint,
    Specifications, Variant,
};
use torque_core::MarketConfig;

use crate::cli::{CarsAction, Cli, Commands, MarketAction, SeriesKind};
use crate::commands::{self, truncate};

fn setup_test_db() -> Database {
    let db = Database::in_memory().unwrap();
    db.insert_car(&NewCar {
        make: "Toyota".to_string(),
        model: "Highlander".to_string(),
        year: 2024,
        car_type: CarType::Suv,
        description: Some("Three-row SUV".to_string()),
        base_price: Some(39_520.0),
        image_url: None,
        variants: vec![Variant {
            name: "XLE".to_string(),
            price: 44_120.0,
            specifications: Specifications {
                fuel_type: Some("Gasoline".to_string()),
                seating_capacity: Some(8),
                comfort_features: vec!["Heated Seats".to_string()],
                ..Default::default()
            },
        }],
    })
    .unwrap();
    db
}

fn test_service(db: Database) -> MarketDataService<StaticMarketFeeds> {
    let feeds = StaticMarketFeeds {
        price_trends: vec![
            PriceTrendPoint {
                date: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
                average_price: 41_000.0,
                min_price: 39_000.0,
                max_price: 43_000.0,
                listings_count: 12,
            },
            PriceTrendPoint {
                date: Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap(),
                average_price: 44_000.0,
                min_price: 42_000.0,
                max_price: 46_000.0,
                listings_count: 9,
            },
        ],
        market_demand: vec![DemandPoint {
            date: Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap(),
            demand_score: 30.0,
            search_volume: 900,
            view_count: 400,
            inquiry_count: 12,
        }],
        ..Default::default()
    };
    MarketDataService::new(db, feeds, MarketConfig::default())
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_recommend_args() {
    let cli = Cli::try_parse_from([
        "torque",
        "recommend",
        "--min-budget",
        "20000",
        "--max-budget",
        "50000",
        "--use",
        "Family",
        "--feature",
        "Heated Seats",
        "--feature",
        "Navigation",
        "--family-size",
        "5",
    ])
    .unwrap();

    match cli.command {
        Commands::Recommend {
            min_budget,
            max_budget,
            primary_use,
            features,
            family_size,
            json,
            ..
        } => {
            assert_eq!(min_budget.zip(max_budget), Some((20_000.0, 50_000.0)));
            assert_eq!(primary_use, Some(PrimaryUse::Family));
            assert_eq!(features.len(), 2);
            assert_eq!(family_size, Some(5));
            assert!(!json);
        }
        _ => panic!("expected recommend"),
    }
}

#[test]
fn test_parse_rejects_half_budget_and_bad_use() {
    assert!(Cli::try_parse_from(["torque", "recommend", "--min-budget", "1000"]).is_err());
    assert!(Cli::try_parse_from(["torque", "recommend", "--use", "racing"]).is_err());
}

#[test]
fn test_parse_global_flags_and_subcommands() {
    let cli = Cli::try_parse_from([
        "torque",
        "market",
        "series",
        "3",
        "dealers",
        "--db",
        "/tmp/x.db",
        "--no-encrypt",
    ])
    .unwrap();
    assert!(cli.no_encrypt);
    assert_eq!(cli.db.to_str(), Some("/tmp/x.db"));
    assert!(matches!(
        cli.command,
        Commands::Market {
            action: MarketAction::Series {
                car_id: 3,
                kind: SeriesKind::Dealers
            }
        }
    ));

    let cli = Cli::try_parse_from(["torque", "cars", "list", "--type", "SUV"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Cars {
            action: Some(CarsAction::List { .. })
        }
    ));
}

// ========== Init / Catalog Command Tests ==========

#[test]
fn test_cmd_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("torque.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());

    let db = commands::open_db(&path, true).unwrap();
    assert_eq!(db.count_cars().unwrap(), 0);
}

#[test]
fn test_cmd_cars_import_and_delete() {
    let db = Database::in_memory().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"make": "Honda", "model": "Civic", "year": 2024, "type": "Hatchback",
              "variants": [{{"name": "Sport", "price": 24950}}]}},
            {{"make": "Ford", "model": "F-150", "year": 2024, "type": "Truck", "basePrice": 36965}}
        ]"#
    )
    .unwrap();

    commands::cmd_cars_import(&db, file.path()).unwrap();
    assert_eq!(db.count_cars().unwrap(), 2);

    let trucks = db
        .list_cars(&CarFilter {
            car_type: Some(CarType::Truck),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(trucks.len(), 1);

    assert!(commands::cmd_cars_list(&db, &CarFilter::default()).is_ok());
    assert!(commands::cmd_cars_show(&db, trucks[0].id).is_ok());

    commands::cmd_cars_delete(&db, trucks[0].id).unwrap();
    assert_eq!(db.count_cars().unwrap(), 1);
    assert!(commands::cmd_cars_delete(&db, trucks[0].id).is_err());
}

#[test]
fn test_cmd_cars_import_invalid_file() {
    let db = Database::in_memory().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();

    assert!(commands::cmd_cars_import(&db, file.path()).is_err());
    assert_eq!(db.count_cars().unwrap(), 0);
}

#[test]
fn test_cmd_cars_show_missing() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_cars_show(&db, 42).is_err());
}

// ========== Market Command Tests ==========

#[tokio::test]
async fn test_cmd_market_show_then_stored_views() {
    let db = setup_test_db();
    let service = test_service(db.clone());

    // Accessors don't refresh
    assert!(commands::cmd_market_best_time(&service, 1).is_err());

    commands::cmd_market_show(&service, 1, false).await.unwrap();
    assert_eq!(db.count_market_records().unwrap(), 1);

    commands::cmd_market_best_time(&service, 1).unwrap();
    commands::cmd_market_insights(&service, 1).unwrap();
    for kind in [
        SeriesKind::Prices,
        SeriesKind::Resale,
        SeriesKind::Demand,
        SeriesKind::Dealers,
    ] {
        commands::cmd_market_series(&service, 1, kind).unwrap();
    }

    let best = service.best_time_to_buy(1).unwrap();
    assert_eq!(best.month, 2);
    assert_eq!(best.reason, "Historically lowest prices in February");
}

#[tokio::test]
async fn test_cmd_market_refresh_commands() {
    let db = setup_test_db();
    let service = test_service(db.clone());

    commands::cmd_market_refresh(&service, 1).await.unwrap();
    assert!(commands::cmd_market_refresh(&service, 99).await.is_err());

    commands::cmd_market_refresh_all(&service, false)
        .await
        .unwrap();
    commands::cmd_market_refresh_all(&service, true).await.unwrap();
    assert_eq!(db.count_market_records().unwrap(), 1);
}

#[tokio::test]
async fn test_cmd_market_show_json() {
    let db = setup_test_db();
    let service = test_service(db);
    assert!(commands::cmd_market_show(&service, 1, true).await.is_ok());
}

// ========== Recommend Command Tests ==========

#[test]
fn test_cmd_recommend() {
    let service = test_service(setup_test_db());
    let prefs = PreferenceVector {
        budget: Some((30_000.0, 50_000.0)),
        primary_use: Some(PrimaryUse::Family),
        must_have_features: vec!["Heated Seats".to_string()],
        family_size: Some(6),
        ..Default::default()
    };

    assert!(commands::cmd_recommend(&service, &prefs, false).is_ok());
    assert!(commands::cmd_recommend(&service, &prefs, true).is_ok());

    let results = service.recommend_cars(&prefs).unwrap();
    assert_eq!(results[0].match_score, 75);
}

#[test]
fn test_cmd_recommend_invalid_budget() {
    let service = test_service(setup_test_db());
    let prefs = PreferenceVector {
        budget: Some((50_000.0, 30_000.0)),
        ..Default::default()
    };
    assert!(commands::cmd_recommend(&service, &prefs, false).is_err());
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("2024 Toyota Highlander Hybrid", 15), "2024 Toyota ...");
    assert_eq!(truncate("Škoda Octavia", 8), "Škoda...");
}
