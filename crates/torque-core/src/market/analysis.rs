//! Market signal computation
//!
//! Both functions are pure: the same series always produce the same signals
//! (apart from the `last_updated` timestamp, which is passed in).

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};

use crate::models::{
    BestTimeToBuy, CompetitivePosition, DemandPoint, MarketInsights, MarketTrend, PriceTrendPoint,
};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const INSUFFICIENT_DATA_REASON: &str = "Insufficient data to determine best time to buy";

/// Demand score above which a car is in a strong position
const STRONG_DEMAND: f64 = 70.0;
/// Demand score above which a car is in a moderate position
const MODERATE_DEMAND: f64 = 40.0;

/// Number of trailing price points the trend looks at
const TREND_WINDOW: usize = 3;

fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown")
}

/// Find the calendar month with the lowest mean average price
///
/// Points are bucketed by calendar month regardless of year. Ties go to the
/// earliest month.
pub fn compute_best_time_to_buy(price_trends: &[PriceTrendPoint]) -> BestTimeToBuy {
    if price_trends.is_empty() {
        return BestTimeToBuy {
            month: 1,
            reason: INSUFFICIENT_DATA_REASON.to_string(),
            discount_percentage: 0,
        };
    }

    // month -> (sum, count); BTreeMap iterates in ascending month order
    let mut buckets: BTreeMap<u32, (f64, u32)> = BTreeMap::new();
    for point in price_trends {
        let entry = buckets.entry(point.date.month()).or_insert((0.0, 0));
        entry.0 += point.average_price;
        entry.1 += 1;
    }

    let means: Vec<(u32, f64)> = buckets
        .into_iter()
        .map(|(month, (sum, count))| (month, sum / count as f64))
        .collect();

    let mut best = means[0];
    let mut max_mean = means[0].1;
    for &(month, mean) in &means[1..] {
        // Strict comparison keeps the earliest month on ties
        if mean < best.1 {
            best = (month, mean);
        }
        if mean > max_mean {
            max_mean = mean;
        }
    }

    let discount = if max_mean > 0.0 {
        ((max_mean - best.1) / max_mean * 100.0).round().clamp(0.0, 100.0) as u32
    } else {
        0
    };

    BestTimeToBuy {
        month: best.0,
        reason: format!("Historically lowest prices in {}", month_name(best.0)),
        discount_percentage: discount,
    }
}

/// Derive volatility, trend and competitive position
///
/// Series are taken in the order given (oldest first). If either series is
/// empty the neutral defaults are returned.
pub fn compute_market_insights(
    price_trends: &[PriceTrendPoint],
    market_demand: &[DemandPoint],
    now: DateTime<Utc>,
) -> MarketInsights {
    let (Some(latest_demand), false) = (market_demand.last(), price_trends.is_empty()) else {
        return MarketInsights {
            price_volatility: 0,
            market_trend: MarketTrend::Stable,
            competitive_position: CompetitivePosition::Moderate,
            last_updated: now,
        };
    };

    let prices: Vec<f64> = price_trends.iter().map(|p| p.average_price).collect();

    MarketInsights {
        price_volatility: price_volatility(&prices),
        market_trend: market_trend(&prices),
        competitive_position: competitive_position(latest_demand.demand_score),
        last_updated: now,
    }
}

/// Coefficient of variation as a rounded percentage, clamped to 0-100
fn price_volatility(prices: &[f64]) -> u32 {
    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    if mean == 0.0 || !mean.is_finite() {
        return 0;
    }

    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    let cv = variance.sqrt() / mean.abs() * 100.0;

    cv.round().clamp(0.0, 100.0) as u32
}

/// Compare the third-most-recent price with the most recent one
///
/// Fewer than three points is not enough to call a direction.
fn market_trend(prices: &[f64]) -> MarketTrend {
    if prices.len() < TREND_WINDOW {
        return MarketTrend::Stable;
    }

    let window = &prices[prices.len() - TREND_WINDOW..];
    let (earliest, latest) = (window[0], window[TREND_WINDOW - 1]);

    if earliest < latest {
        MarketTrend::Rising
    } else if earliest > latest {
        MarketTrend::Falling
    } else {
        MarketTrend::Stable
    }
}

fn competitive_position(demand_score: f64) -> CompetitivePosition {
    if demand_score > STRONG_DEMAND {
        CompetitivePosition::Strong
    } else if demand_score > MODERATE_DEMAND {
        CompetitivePosition::Moderate
    } else {
        CompetitivePosition::Weak
    }
}
