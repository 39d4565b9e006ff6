//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init) and shared utilities (open_db, market_service)
//! - `cars` - Car catalog commands (list, show, import, delete)
//! - `market` - Market data commands (show, refresh, best time, insights, series)
//! - `recommend` - Preference-based recommendations
//! - `watch` - Scheduled market refresh

pub mod cars;
pub mod core;
pub mod market;
pub mod recommend;
pub mod watch;

// Re-export command functions for main.rs
pub use cars::*;
pub use core::*;
pub use market::*;
pub use recommend::*;
pub use watch::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
