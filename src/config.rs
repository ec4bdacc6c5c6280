//! Configuration for the route source and the map coordinator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{GpsPoint, Result, SenderosError};

/// Default routes API host.
pub const DEFAULT_BASE_URL: &str = "https://routes.senderos.app";

/// Routes API client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL; the client appends `/routesApi/routes/near`
    pub base_url: String,
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Per-read timeout in seconds
    pub read_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
        }
    }
}

impl SourceConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Full URL of the nearby-routes endpoint (without query string).
    pub fn nearby_url(&self) -> String {
        format!(
            "{}/routesApi/routes/near",
            self.base_url.trim_end_matches('/')
        )
    }
}

/// Map coordinator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Where to look for routes before the first location fix
    pub default_location: GpsPoint,
    /// Maximum distance (meters) from a route start to begin navigation
    pub start_zone_radius_m: f64,
    /// Map-tap tolerance (kilometers) against route vertices
    pub tap_tolerance_km: f64,
    /// Location poll period in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_location: GpsPoint::new(4.63, -74.08034),
            start_zone_radius_m: 200.0,
            tap_tolerance_km: 0.05,
            poll_interval_ms: 5000,
        }
    }
}

impl MapConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Top-level configuration handed over by the app shell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderosConfig {
    pub source: SourceConfig,
    pub map: MapConfig,
    /// SQLite file for the route cache; `None` keeps the cache in memory
    pub cache_path: Option<String>,
}

impl SenderosConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SenderosError::Parse(e.to_string()))
    }
}
