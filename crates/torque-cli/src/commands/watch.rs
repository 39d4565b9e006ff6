//! Scheduled market refresh command

use anyhow::Result;
use torque_core::market::{
    start_market_scheduler, HttpMarketFeeds, MarketDataService, MarketScheduleConfig,
};

pub async fn cmd_watch(
    service: MarketDataService<HttpMarketFeeds>,
    interval_hours: Option<u64>,
    run_now: bool,
) -> Result<()> {
    let config = match interval_hours {
        Some(hours) => MarketScheduleConfig::every(hours),
        None => MarketScheduleConfig::from_env(),
    };
    let Some(mut config) = config else {
        anyhow::bail!(
            "No refresh interval. Pass --interval-hours N or set TORQUE_REFRESH_SCHEDULE (hours, > 0)"
        );
    };
    config.run_on_start = run_now;

    println!(
        "⏱️  Refreshing market data every {} hour(s). Press Ctrl+C to stop.",
        config.interval_hours
    );

    let handle = start_market_scheduler(service, config);
    tokio::signal::ctrl_c().await?;
    tracing::debug!("Ctrl+C received, stopping scheduler");
    handle.abort();

    println!();
    println!("👋 Scheduler stopped");
    Ok(())
}
