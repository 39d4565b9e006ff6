//! Test utilities for torque-core
//!
//! This module provides a mock market data provider that serves all four
//! provider endpoints, for integration tests and local development.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

use crate::config::{MarketConfig, ProviderEndpoint};

/// Make for which the mock provider has no data at all
pub const UNKNOWN_MAKE: &str = "Unknown";

#[derive(Clone)]
struct MockState {
    failing: bool,
    api_key: Option<String>,
    requests: Arc<AtomicUsize>,
}

#[derive(Debug, Deserialize)]
struct ProviderQuery {
    make: String,
    api_key: Option<String>,
}

/// Mock market data provider for testing and development
///
/// Serves `/prices`, `/resale-values`, `/market-demand` and
/// `/dealer-inventory` with canned series, so one instance can stand in for
/// all three providers.
pub struct MockMarketServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockMarketServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(false, None).await
    }

    /// Start a server that answers every request with 503
    pub async fn start_failing() -> Self {
        Self::start_with(true, None).await
    }

    /// Start a server that rejects requests without this `api_key`
    pub async fn start_with_api_key(api_key: &str) -> Self {
        Self::start_with(false, Some(api_key.to_string())).await
    }

    async fn start_with(failing: bool, api_key: Option<String>) -> Self {
        let requests = Arc::new(AtomicUsize::new(0));
        let state = MockState {
            failing,
            api_key,
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/prices", get(handle_prices))
            .route("/resale-values", get(handle_resale_values))
            .route("/market-demand", get(handle_market_demand))
            .route("/dealer-inventory", get(handle_dealer_inventory))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Market config pointing every provider at this server
    pub fn market_config(&self) -> MarketConfig {
        let endpoint = ProviderEndpoint {
            base_url: Some(self.url()),
            api_key: None,
        };
        MarketConfig {
            pricing: endpoint.clone(),
            resale: endpoint.clone(),
            demand: endpoint,
            ..Default::default()
        }
    }

    /// Number of provider requests served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockMarketServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Count the request and decide whether to refuse it
fn check(state: &MockState, query: &ProviderQuery) -> Option<Response> {
    state.requests.fetch_add(1, Ordering::SeqCst);

    if state.failing {
        return Some(StatusCode::SERVICE_UNAVAILABLE.into_response());
    }
    if state.api_key.is_some() && state.api_key != query.api_key {
        return Some(StatusCode::UNAUTHORIZED.into_response());
    }
    None
}

/// Two January prices and one July price
async fn handle_prices(
    State(state): State<MockState>,
    Query(query): Query<ProviderQuery>,
) -> Response {
    if let Some(refused) = check(&state, &query) {
        return refused;
    }
    if query.make == UNKNOWN_MAKE {
        return Json(json!({ "prices": [] })).into_response();
    }

    Json(json!({
        "prices": [
            { "date": "2024-01-05", "averagePrice": 20000, "minPrice": 18500, "maxPrice": 21500, "listingsCount": 40 },
            { "date": "2024-01-20", "averagePrice": 22000, "minPrice": 20500, "maxPrice": 23500, "listingsCount": 38 },
            { "date": "2024-07-10", "averagePrice": 30000, "minPrice": 28000, "maxPrice": 32000, "listingsCount": 25 }
        ]
    }))
    .into_response()
}

async fn handle_resale_values(
    State(state): State<MockState>,
    Query(query): Query<ProviderQuery>,
) -> Response {
    if let Some(refused) = check(&state, &query) {
        return refused;
    }
    if query.make == UNKNOWN_MAKE {
        return Json(json!({ "predictions": [] })).into_response();
    }

    Json(json!({
        "predictions": [
            {
                "year": 2027,
                "value": 24500,
                "confidence": 82,
                "factors": [
                    { "name": "brand reliability", "impact": 0.08 },
                    { "name": "mileage", "impact": -0.12 }
                ]
            },
            { "year": 2029, "value": 19000, "confidence": 64 }
        ]
    }))
    .into_response()
}

async fn handle_market_demand(
    State(state): State<MockState>,
    Query(query): Query<ProviderQuery>,
) -> Response {
    if let Some(refused) = check(&state, &query) {
        return refused;
    }
    if query.make == UNKNOWN_MAKE {
        return Json(json!({ "metrics": [] })).into_response();
    }

    Json(json!({
        "metrics": [
            { "date": "2024-06-01", "demandScore": 55, "searchVolume": 12000, "viewCount": 5400, "inquiryCount": 310 },
            { "date": "2024-07-01", "demandScore": 78, "searchVolume": 15800, "viewCount": 7100, "inquiryCount": 420 }
        ]
    }))
    .into_response()
}

async fn handle_dealer_inventory(
    State(state): State<MockState>,
    Query(query): Query<ProviderQuery>,
) -> Response {
    if let Some(refused) = check(&state, &query) {
        return refused;
    }
    if query.make == UNKNOWN_MAKE {
        return Json(json!({ "dealers": [] })).into_response();
    }

    Json(json!({
        "dealers": [
            {
                "id": "D-100",
                "name": "Downtown Motors",
                "city": "Portland",
                "state": "OR",
                "zipCode": "97201",
                "inventoryCount": 7,
                "averagePrice": 29500,
                "lastUpdated": "2024-07-02T09:00:00Z"
            }
        ]
    }))
    .into_response()
}
