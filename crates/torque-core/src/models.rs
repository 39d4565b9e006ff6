//! Domain models for Torque

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Car catalog
// ============================================================================

/// Body style of a car
///
/// Serialized as the display string ("Sedan", "SUV", ...). Types the scoring
/// tables don't know about are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CarType {
    Sedan,
    Suv,
    Hatchback,
    Coupe,
    Truck,
    Minivan,
    Crossover,
    Other(String),
}

impl CarType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sedan => "Sedan",
            Self::Suv => "SUV",
            Self::Hatchback => "Hatchback",
            Self::Coupe => "Coupe",
            Self::Truck => "Truck",
            Self::Minivan => "Minivan",
            Self::Crossover => "Crossover",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for CarType {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "sedan" => Self::Sedan,
            "suv" => Self::Suv,
            "hatchback" => Self::Hatchback,
            "coupe" => Self::Coupe,
            "truck" | "pickup" => Self::Truck,
            "minivan" | "van" => Self::Minivan,
            "crossover" => Self::Crossover,
            _ => Self::Other(s),
        }
    }
}

impl From<CarType> for String {
    fn from(t: CarType) -> Self {
        match t {
            CarType::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for CarType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(CarType::from(s.to_string()))
    }
}

impl fmt::Display for CarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// City/highway fuel economy in MPG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mpg {
    pub city: f64,
    pub highway: f64,
}

/// Technical specification of a variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Specifications {
    pub engine: Option<String>,
    pub horsepower: Option<f64>,
    pub torque: Option<f64>,
    pub transmission: Option<String>,
    pub fuel_type: Option<String>,
    pub mpg: Option<Mpg>,
    pub acceleration: Option<f64>,
    pub top_speed: Option<f64>,
    pub cargo_space: Option<f64>,
    pub seating_capacity: Option<u32>,
    pub safety_features: Vec<String>,
    pub infotainment: Vec<String>,
    pub comfort_features: Vec<String>,
}

/// A specific trim/configuration of a car model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub specifications: Specifications,
}

/// A car in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    #[serde(rename = "type")]
    pub car_type: CarType,
    pub description: Option<String>,
    pub base_price: Option<f64>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    pub created_at: DateTime<Utc>,
}

impl Car {
    /// Price used for budget matching: first variant's price, else base price
    pub fn reference_price(&self) -> Option<f64> {
        self.variants
            .first()
            .map(|v| v.price)
            .or(self.base_price)
    }

    /// First variant, the one feature and seating checks are made against
    pub fn primary_variant(&self) -> Option<&Variant> {
        self.variants.first()
    }

    /// "2024 Toyota Camry"
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

/// Payload for creating or replacing a car
///
/// Field names match the catalog JSON format, so seed files deserialize directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCar {
    pub make: String,
    pub model: String,
    pub year: i32,
    #[serde(rename = "type")]
    pub car_type: CarType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl NewCar {
    /// Parse a catalog file: a JSON array of cars
    pub fn parse_catalog(json: &str) -> Result<Vec<NewCar>> {
        let cars: Vec<NewCar> = serde_json::from_str(json)?;
        Ok(cars)
    }
}

/// Catalog query; every set field must match
#[derive(Debug, Clone, Default)]
pub struct CarFilter {
    pub make: Option<String>,
    pub car_type: Option<CarType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub year: Option<i32>,
}

// ============================================================================
// Market data series
// ============================================================================

/// One observation of listing prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTrendPoint {
    #[serde(deserialize_with = "deserialize_flexible_datetime")]
    pub date: DateTime<Utc>,
    pub average_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub listings_count: u32,
}

/// One observation of shopper demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandPoint {
    #[serde(deserialize_with = "deserialize_flexible_datetime")]
    pub date: DateTime<Utc>,
    /// 0-100
    pub demand_score: f64,
    pub search_volume: u64,
    pub view_count: u64,
    pub inquiry_count: u64,
}

/// Something that moves a resale prediction up or down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResaleFactor {
    pub name: String,
    /// Positive or negative impact on value
    pub impact: f64,
}

/// Predicted resale value for a future year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResaleValue {
    pub year: i32,
    pub predicted_value: f64,
    /// 0-100 percentage
    pub confidence: f64,
    #[serde(default)]
    pub factors: Vec<ResaleFactor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DealerLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

/// Stock of a car at one dealer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerInventory {
    pub dealer_id: String,
    pub dealer_name: String,
    #[serde(default)]
    pub location: DealerLocation,
    pub inventory_count: u32,
    pub average_price: f64,
    #[serde(deserialize_with = "deserialize_flexible_datetime")]
    pub last_updated: DateTime<Utc>,
}

// ============================================================================
// Derived market signals
// ============================================================================

/// Cheapest calendar month to buy in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestTimeToBuy {
    /// 1-12
    pub month: u32,
    pub reason: String,
    /// 0-100
    pub discount_percentage: u32,
}

/// Direction of recent prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketTrend {
    Rising,
    Stable,
    Falling,
}

impl MarketTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Stable => "stable",
            Self::Falling => "falling",
        }
    }
}

impl fmt::Display for MarketTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MarketTrend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rising" => Ok(Self::Rising),
            "stable" => Ok(Self::Stable),
            "falling" => Ok(Self::Falling),
            _ => Err(format!("Unknown market trend: {}", s)),
        }
    }
}

/// How strongly shoppers want this car right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitivePosition {
    Strong,
    Moderate,
    Weak,
}

impl CompetitivePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
        }
    }
}

impl fmt::Display for CompetitivePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CompetitivePosition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strong" => Ok(Self::Strong),
            "moderate" => Ok(Self::Moderate),
            "weak" => Ok(Self::Weak),
            _ => Err(format!("Unknown competitive position: {}", s)),
        }
    }
}

/// Summary signals derived from price and demand history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInsights {
    /// Coefficient of variation of average prices, 0-100
    pub price_volatility: u32,
    pub market_trend: MarketTrend,
    pub competitive_position: CompetitivePosition,
    pub last_updated: DateTime<Utc>,
}

impl MarketInsights {
    /// Whether these insights are older than `max_age` as of `now`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_updated) > max_age
    }
}

/// Full market record for one car, replaced wholesale on every refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub car_id: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price_trends: Vec<PriceTrendPoint>,
    pub resale_values: Vec<ResaleValue>,
    pub market_demand: Vec<DemandPoint>,
    pub best_time_to_buy: BestTimeToBuy,
    pub dealer_inventory: Vec<DealerInventory>,
    pub market_insights: MarketInsights,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Recommendations
// ============================================================================

/// What the car will mostly be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryUse {
    Commuting,
    Family,
    Luxury,
    Performance,
    Adventure,
}

impl PrimaryUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commuting => "commuting",
            Self::Family => "family",
            Self::Luxury => "luxury",
            Self::Performance => "performance",
            Self::Adventure => "adventure",
        }
    }
}

impl fmt::Display for PrimaryUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PrimaryUse {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "commuting" => Ok(Self::Commuting),
            "family" => Ok(Self::Family),
            "luxury" => Ok(Self::Luxury),
            "performance" => Ok(Self::Performance),
            "adventure" => Ok(Self::Adventure),
            _ => Err(format!("Unknown primary use: {}", s)),
        }
    }
}

/// Where and how the buyer lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifestyle {
    Urban,
    Suburban,
    Rural,
    Active,
    Luxury,
}

impl Lifestyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urban => "urban",
            Self::Suburban => "suburban",
            Self::Rural => "rural",
            Self::Active => "active",
            Self::Luxury => "luxury",
        }
    }
}

impl fmt::Display for Lifestyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Lifestyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "urban" => Ok(Self::Urban),
            "suburban" => Ok(Self::Suburban),
            "rural" => Ok(Self::Rural),
            "active" => Ok(Self::Active),
            "luxury" => Ok(Self::Luxury),
            _ => Err(format!("Unknown lifestyle: {}", s)),
        }
    }
}

/// A buyer's stated preferences
///
/// Unset (or empty-string) fields don't contribute to the match score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceVector {
    /// Inclusive [min, max] price range
    pub budget: Option<(f64, f64)>,
    #[serde(deserialize_with = "deserialize_blank_as_none")]
    pub primary_use: Option<PrimaryUse>,
    #[serde(deserialize_with = "deserialize_blank_string")]
    pub fuel_preference: Option<String>,
    pub must_have_features: Vec<String>,
    #[serde(deserialize_with = "deserialize_blank_as_none")]
    pub lifestyle: Option<Lifestyle>,
    pub family_size: Option<u32>,
}

impl PreferenceVector {
    /// Reject preference values that can never describe a real buyer
    pub fn validate(&self) -> Result<()> {
        if let Some((min, max)) = self.budget {
            if !min.is_finite() || !max.is_finite() || min < 0.0 {
                return Err(Error::InvalidData(format!(
                    "Budget must be non-negative, got {} - {}",
                    min, max
                )));
            }
            if min > max {
                return Err(Error::InvalidData(format!(
                    "Budget minimum {} exceeds maximum {}",
                    min, max
                )));
            }
        }
        if self.family_size == Some(0) {
            return Err(Error::InvalidData(
                "Family size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A car with its match score against a preference vector
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCar {
    #[serde(flatten)]
    pub car: Car,
    /// 0-100
    pub match_score: u32,
    /// One entry per criterion that contributed, in evaluation order
    pub match_reasons: Vec<String>,
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
pub(crate) fn deserialize_flexible_datetime<'de, D>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flexible_datetime(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn parse_flexible_datetime(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("Invalid date: {}", raw))
}

/// Treat a missing, null or blank string as `None`, otherwise parse
fn deserialize_blank_as_none<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn deserialize_blank_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
