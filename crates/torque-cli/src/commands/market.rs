//! Market data command implementations

use anyhow::Result;
use torque_core::market::{MarketDataService, MarketFeeds};
use torque_core::models::{
    BestTimeToBuy, CompetitivePosition, MarketData, MarketInsights, MarketTrend,
};
use torque_core::recommend::format_dollars;

use crate::cli::SeriesKind;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_abbrev(month: u32) -> &'static str {
    MONTHS
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

pub async fn cmd_market_show<F: MarketFeeds + 'static>(
    service: &MarketDataService<F>,
    car_id: i64,
    json: bool,
) -> Result<()> {
    let record = service.get_market_data(car_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    print_record(&record);
    Ok(())
}

pub async fn cmd_market_refresh<F: MarketFeeds + 'static>(
    service: &MarketDataService<F>,
    car_id: i64,
) -> Result<()> {
    println!("🔄 Refreshing market data for car {}...", car_id);

    let record = service.refresh_market_data(car_id).await?;

    println!(
        "✅ {} price points, {} resale predictions, {} demand points, {} dealers",
        record.price_trends.len(),
        record.resale_values.len(),
        record.market_demand.len(),
        record.dealer_inventory.len()
    );
    print_best_time(&record.best_time_to_buy);
    print_insights(&record.market_insights);
    Ok(())
}

pub async fn cmd_market_refresh_all<F: MarketFeeds + 'static>(
    service: &MarketDataService<F>,
    stale_only: bool,
) -> Result<()> {
    let workers = service.config().max_concurrent_refreshes;
    if stale_only {
        println!("🔄 Refreshing stale market data ({} at a time)...", workers);
    } else {
        println!(
            "🔄 Refreshing market data for the whole catalog ({} at a time)...",
            workers
        );
    }

    let summary = if stale_only {
        service.refresh_stale_market_data().await?
    } else {
        service.refresh_all_market_data().await?
    };

    println!();
    println!("📊 Refresh Results");
    println!("   ─────────────────────────────");
    println!("   Cars considered: {}", summary.total);
    println!("   ✅ Refreshed: {}", summary.refreshed);
    if summary.failed > 0 {
        println!("   ❌ Failed: {} (run with --verbose for details)", summary.failed);
    }

    Ok(())
}

pub fn cmd_market_best_time<F: MarketFeeds + 'static>(
    service: &MarketDataService<F>,
    car_id: i64,
) -> Result<()> {
    let best = service.best_time_to_buy(car_id)?;
    print_best_time(&best);
    Ok(())
}

pub fn cmd_market_insights<F: MarketFeeds + 'static>(
    service: &MarketDataService<F>,
    car_id: i64,
) -> Result<()> {
    let insights = service.market_insights(car_id)?;
    print_insights(&insights);
    Ok(())
}

pub fn cmd_market_series<F: MarketFeeds + 'static>(
    service: &MarketDataService<F>,
    car_id: i64,
    kind: SeriesKind,
) -> Result<()> {
    let json = match kind {
        SeriesKind::Prices => serde_json::to_string_pretty(&service.price_trends(car_id)?)?,
        SeriesKind::Resale => serde_json::to_string_pretty(&service.resale_values(car_id)?)?,
        SeriesKind::Demand => serde_json::to_string_pretty(&service.market_demand(car_id)?)?,
        SeriesKind::Dealers => serde_json::to_string_pretty(&service.dealer_inventory(car_id)?)?,
    };
    println!("{}", json);
    Ok(())
}

fn print_record(record: &MarketData) {
    println!();
    println!(
        "📈 Market Data: {} {} {}",
        record.year, record.make, record.model
    );
    println!("   ─────────────────────────────────────────────────────────────");

    if record.price_trends.is_empty() {
        println!("   No price history available");
    } else {
        println!("   Price history:");
        for point in &record.price_trends {
            println!(
                "     {} │ avg {:>9} │ {:>9} - {:<9} │ {} listings",
                point.date.format("%Y-%m-%d"),
                format_dollars(point.average_price),
                format_dollars(point.min_price),
                format_dollars(point.max_price),
                point.listings_count
            );
        }
    }

    if !record.resale_values.is_empty() {
        println!("   Resale outlook:");
        for value in &record.resale_values {
            println!(
                "     {} │ {:>9} │ {:.0}% confidence",
                value.year,
                format_dollars(value.predicted_value),
                value.confidence
            );
        }
    }

    if !record.dealer_inventory.is_empty() {
        let total: u32 = record.dealer_inventory.iter().map(|d| d.inventory_count).sum();
        println!(
            "   Dealer stock: {} units across {} dealer(s)",
            total,
            record.dealer_inventory.len()
        );
    }

    print_best_time(&record.best_time_to_buy);
    print_insights(&record.market_insights);
}

fn print_best_time(best: &BestTimeToBuy) {
    println!();
    println!("   📅 Best time to buy: {}", month_abbrev(best.month));
    println!("      {}", best.reason);
    if best.discount_percentage > 0 {
        println!(
            "      ~{}% below the most expensive month",
            best.discount_percentage
        );
    }
}

fn print_insights(insights: &MarketInsights) {
    let trend_icon = match insights.market_trend {
        MarketTrend::Rising => "📈",
        MarketTrend::Stable => "➡️ ",
        MarketTrend::Falling => "📉",
    };
    let position_icon = match insights.competitive_position {
        CompetitivePosition::Strong => "🔥",
        CompetitivePosition::Moderate => "👍",
        CompetitivePosition::Weak => "🧊",
    };

    println!();
    println!("   {} Trend: {}", trend_icon, insights.market_trend);
    println!("   📊 Price volatility: {}%", insights.price_volatility);
    println!(
        "   {} Demand position: {}",
        position_icon, insights.competitive_position
    );
    println!(
        "   🕒 Updated: {}",
        insights.last_updated.format("%Y-%m-%d %H:%M UTC")
    );
}
