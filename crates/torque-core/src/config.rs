//! Market provider configuration
//!
//! Config is loaded with a three-layer resolution:
//! 1. Embedded defaults (compiled into binary)
//! 2. Override file in data dir (~/.local/share/torque/config/market.toml)
//! 3. Environment variables (`TORQUE_PRICING_URL`, `TORQUE_HTTP_TIMEOUT_SECS`, ...)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/market.toml");

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONCURRENT_REFRESHES: usize = 4;
const DEFAULT_STALE_AFTER_HOURS: i64 = 24;
/// Ten years; longer windows would overflow date arithmetic
const MAX_STALE_AFTER_HOURS: i64 = 24 * 365 * 10;

/// Where one upstream provider lives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderEndpoint {
    /// None disables the provider; its series comes back empty
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

/// Settings for fetching and caching market data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    pub pricing: ProviderEndpoint,
    pub resale: ProviderEndpoint,
    /// Serves both market demand and dealer inventory
    pub demand: ProviderEndpoint,
    /// Per-request timeout for provider calls
    pub http_timeout: Duration,
    /// Cap on cars refreshed at once during a bulk refresh
    pub max_concurrent_refreshes: usize,
    /// Age after which a stored market record is refetched
    pub stale_after_hours: i64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            pricing: ProviderEndpoint::default(),
            resale: ProviderEndpoint::default(),
            demand: ProviderEndpoint::default(),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent_refreshes: DEFAULT_MAX_CONCURRENT_REFRESHES,
            stale_after_hours: DEFAULT_STALE_AFTER_HOURS,
        }
    }
}

impl MarketConfig {
    /// Load from the default override path (or embedded defaults), then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::from_toml(DEFAULT_CONFIG)?,
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific TOML file, without environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML content; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid market config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(defaults) = raw.defaults {
            if let Some(timeout) = defaults.timeout_secs {
                config.http_timeout = Duration::from_secs(timeout);
            }
            if let Some(max) = defaults.max_concurrent_refreshes {
                config.max_concurrent_refreshes = max;
            }
            if let Some(hours) = defaults.stale_after_hours {
                config.stale_after_hours = hours;
            }
        }

        if let Some(providers) = raw.providers {
            if let Some(p) = providers.pricing {
                config.pricing = p.into_endpoint();
            }
            if let Some(p) = providers.resale {
                config.resale = p.into_endpoint();
            }
            if let Some(p) = providers.demand {
                config.demand = p.into_endpoint();
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply `TORQUE_*` overrides from a variable lookup
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        for (endpoint, prefix) in [
            (&mut self.pricing, "TORQUE_PRICING"),
            (&mut self.resale, "TORQUE_RESALE"),
            (&mut self.demand, "TORQUE_DEMAND"),
        ] {
            if let Some(url) = non_empty(&format!("{}_URL", prefix)) {
                endpoint.base_url = Some(url.trim_end_matches('/').to_string());
            }
            if let Some(key) = non_empty(&format!("{}_API_KEY", prefix)) {
                endpoint.api_key = Some(key);
            }
        }

        if let Some(secs) = non_empty("TORQUE_HTTP_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.http_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = non_empty("TORQUE_MAX_CONCURRENT_REFRESHES")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            self.max_concurrent_refreshes = max;
        }
        if let Some(hours) = non_empty("TORQUE_STALE_AFTER_HOURS")
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|h| (0..=MAX_STALE_AFTER_HOURS).contains(h))
        {
            self.stale_after_hours = hours;
        }
    }

    /// Staleness window as a chrono duration, clamped to 0..=10 years
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_after_hours.clamp(0, MAX_STALE_AFTER_HOURS))
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_refreshes == 0 {
            return Err(Error::Config(
                "max_concurrent_refreshes must be at least 1".to_string(),
            ));
        }
        if !(0..=MAX_STALE_AFTER_HOURS).contains(&self.stale_after_hours) {
            return Err(Error::Config(format!(
                "stale_after_hours must be between 0 and {}",
                MAX_STALE_AFTER_HOURS
            )));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("torque").join("config").join("market.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    defaults: Option<RawDefaults>,
    providers: Option<RawProviders>,
}

#[derive(Debug, Deserialize)]
struct RawDefaults {
    timeout_secs: Option<u64>,
    max_concurrent_refreshes: Option<usize>,
    stale_after_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawProviders {
    pricing: Option<RawProvider>,
    resale: Option<RawProvider>,
    demand: Option<RawProvider>,
}

#[derive(Debug, Deserialize)]
struct RawProvider {
    base_url: Option<String>,
    api_key: Option<String>,
}

impl RawProvider {
    fn into_endpoint(self) -> ProviderEndpoint {
        ProviderEndpoint {
            base_url: self
                .base_url
                .filter(|u| !u.trim().is_empty())
                .map(|u| u.trim_end_matches('/').to_string()),
            api_key: self.api_key.filter(|k| !k.is_empty()),
        }
    }
}
