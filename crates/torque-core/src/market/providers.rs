//! Upstream market data providers
//!
//! Three providers feed the engine: pricing, resale valuation, and
//! demand/inventory (which serves both the demand series and dealer stock).
//! Every fetch is keyed by make, model and year.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::{MarketConfig, ProviderEndpoint};
use crate::error::{Error, Result};
use crate::models::{
    deserialize_flexible_datetime, DealerInventory, DealerLocation, DemandPoint,
    PriceTrendPoint, ResaleFactor, ResaleValue,
};

/// Source of raw market series for a car
///
/// Implementations return errors freely; the service turns a failed feed
/// into an empty series.
#[async_trait]
pub trait MarketFeeds: Send + Sync {
    async fn fetch_price_trends(
        &self,
        make: &str,
        model: &str,
        year: i32,
    ) -> Result<Vec<PriceTrendPoint>>;

    async fn fetch_resale_values(
        &self,
        make: &str,
        model: &str,
        year: i32,
    ) -> Result<Vec<ResaleValue>>;

    async fn fetch_market_demand(
        &self,
        make: &str,
        model: &str,
        year: i32,
    ) -> Result<Vec<DemandPoint>>;

    async fn fetch_dealer_inventory(
        &self,
        make: &str,
        model: &str,
        year: i32,
    ) -> Result<Vec<DealerInventory>>;
}

/// Feeds backed by the providers' HTTP APIs
#[derive(Clone)]
pub struct HttpMarketFeeds {
    http_client: Client,
    pricing: ProviderEndpoint,
    resale: ProviderEndpoint,
    demand: ProviderEndpoint,
}

#[derive(Debug, Deserialize)]
struct PricesResponse {
    #[serde(default)]
    prices: Vec<PriceTrendPoint>,
}

#[derive(Debug, Deserialize)]
struct ResaleResponse {
    #[serde(default)]
    predictions: Vec<RawPrediction>,
}

/// Resale prediction as the valuation provider sends it
#[derive(Debug, Deserialize)]
struct RawPrediction {
    year: i32,
    value: f64,
    confidence: f64,
    #[serde(default)]
    factors: Vec<ResaleFactor>,
}

impl From<RawPrediction> for ResaleValue {
    fn from(raw: RawPrediction) -> Self {
        Self {
            year: raw.year,
            predicted_value: raw.value,
            confidence: raw.confidence,
            factors: raw.factors,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DemandResponse {
    #[serde(default)]
    metrics: Vec<DemandPoint>,
}

#[derive(Debug, Deserialize)]
struct DealersResponse {
    #[serde(default)]
    dealers: Vec<RawDealer>,
}

/// Dealer stock as the inventory provider sends it: flat address fields
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDealer {
    id: RawId,
    name: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    zip_code: Option<String>,
    inventory_count: u32,
    average_price: f64,
    #[serde(deserialize_with = "deserialize_flexible_datetime")]
    last_updated: DateTime<Utc>,
}

/// Dealer ids arrive as strings or numbers depending on the provider
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawDealer> for DealerInventory {
    fn from(raw: RawDealer) -> Self {
        let dealer_id = match raw.id {
            RawId::Text(id) => id,
            RawId::Number(id) => id.to_string(),
        };
        Self {
            dealer_id,
            dealer_name: raw.name,
            location: DealerLocation {
                city: raw.city,
                state: raw.state,
                zip_code: raw.zip_code,
            },
            inventory_count: raw.inventory_count,
            average_price: raw.average_price,
            last_updated: raw.last_updated,
        }
    }
}

impl HttpMarketFeeds {
    /// Build feeds for the configured endpoints, with the configured timeout
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        let http_client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            http_client,
            pricing: config.pricing.clone(),
            resale: config.resale.clone(),
            demand: config.demand.clone(),
        })
    }

    /// GET `{base_url}/{path}` and decode the body
    ///
    /// Returns None when the provider has no base URL configured.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &ProviderEndpoint,
        path: &str,
        make: &str,
        model: &str,
        year: i32,
    ) -> Result<Option<T>> {
        let Some(base_url) = endpoint.base_url.as_deref() else {
            debug!(path, "Provider not configured, skipping");
            return Ok(None);
        };

        let year = year.to_string();
        let mut query = vec![("make", make), ("model", model), ("year", year.as_str())];
        if let Some(key) = endpoint.api_key.as_deref() {
            query.push(("api_key", key));
        }

        let url = format!("{}/{}", base_url, path);
        debug!(url = %url, make, model, "Fetching market series");

        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let parsed = serde_json::from_str(&body)
            .map_err(|e| Error::Upstream(format!("Malformed response from {}: {}", url, e)))?;

        Ok(Some(parsed))
    }
}

#[async_trait]
impl MarketFeeds for HttpMarketFeeds {
    async fn fetch_price_trends(
        &self,
        make: &str,
        model: &str,
        year: i32,
    ) -> Result<Vec<PriceTrendPoint>> {
        let response: Option<PricesResponse> =
            self.get(&self.pricing, "prices", make, model, year).await?;
        Ok(response.map(|r| r.prices).unwrap_or_default())
    }

    async fn fetch_resale_values(
        &self,
        make: &str,
        model: &str,
        year: i32,
    ) -> Result<Vec<ResaleValue>> {
        let response: Option<ResaleResponse> =
            self.get(&self.resale, "resale-values", make, model, year).await?;
        Ok(response
            .map(|r| r.predictions.into_iter().map(ResaleValue::from).collect())
            .unwrap_or_default())
    }

    async fn fetch_market_demand(
        &self,
        make: &str,
        model: &str,
        year: i32,
    ) -> Result<Vec<DemandPoint>> {
        let response: Option<DemandResponse> =
            self.get(&self.demand, "market-demand", make, model, year).await?;
        Ok(response.map(|r| r.metrics).unwrap_or_default())
    }

    async fn fetch_dealer_inventory(
        &self,
        make: &str,
        model: &str,
        year: i32,
    ) -> Result<Vec<DealerInventory>> {
        let response: Option<DealersResponse> =
            self.get(&self.demand, "dealer-inventory", make, model, year).await?;
        Ok(response
            .map(|r| r.dealers.into_iter().map(DealerInventory::from).collect())
            .unwrap_or_default())
    }
}

/// Fixed in-memory feeds
///
/// Returns the same series for every car. Individual feeds can be made to
/// fail, for exercising degraded refreshes without a network.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketFeeds {
    pub price_trends: Vec<PriceTrendPoint>,
    pub resale_values: Vec<ResaleValue>,
    pub market_demand: Vec<DemandPoint>,
    pub dealer_inventory: Vec<DealerInventory>,
    pub fail_pricing: bool,
    pub fail_resale: bool,
    pub fail_demand: bool,
}

impl StaticMarketFeeds {
    /// Feeds where every provider is down
    pub fn unavailable() -> Self {
        Self {
            fail_pricing: true,
            fail_resale: true,
            fail_demand: true,
            ..Default::default()
        }
    }

    fn check(failed: bool, provider: &str) -> Result<()> {
        if failed {
            return Err(Error::Upstream(format!("{} provider unavailable", provider)));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketFeeds for StaticMarketFeeds {
    async fn fetch_price_trends(&self, _: &str, _: &str, _: i32) -> Result<Vec<PriceTrendPoint>> {
        Self::check(self.fail_pricing, "pricing")?;
        Ok(self.price_trends.clone())
    }

    async fn fetch_resale_values(&self, _: &str, _: &str, _: i32) -> Result<Vec<ResaleValue>> {
        Self::check(self.fail_resale, "resale")?;
        Ok(self.resale_values.clone())
    }

    async fn fetch_market_demand(&self, _: &str, _: &str, _: i32) -> Result<Vec<DemandPoint>> {
        Self::check(self.fail_demand, "demand")?;
        Ok(self.market_demand.clone())
    }

    async fn fetch_dealer_inventory(
        &self,
        _: &str,
        _: &str,
        _: i32,
    ) -> Result<Vec<DealerInventory>> {
        Self::check(self.fail_demand, "demand")?;
        Ok(self.dealer_inventory.clone())
    }
}
