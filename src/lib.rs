//! # Senderos
//!
//! Nearby walking and cycling route discovery for mobile apps.
//!
//! This library provides:
//! - Fetching nearby routes from the routes API, with a SQLite cache fallback
//! - A map coordinator holding the session state of the map screen
//!   (location, routes, distance filter, selection, navigation start checks)
//! - A cancellable location poll that drives the coordinator
//! - Thin state holders for the account screens (login, register, password
//!   recovery, profile) over injected identity/profile backends
//!
//! ## Features
//!
//! - **`ffi`** - Enable UniFFI bindings for mobile platforms (iOS/Android)
//!
//! ## Quick Start
//!
//! ```rust
//! use senderos::{GpsPoint, Route, geo_utils};
//!
//! let here = GpsPoint::new(4.6300, -74.0800);
//! let route = Route::from_path(
//!     "r1",
//!     "Parque Nacional",
//!     3.2,
//!     None,
//!     vec![GpsPoint::new(4.6315, -74.0795), GpsPoint::new(4.6400, -74.0700)],
//! )
//! .unwrap();
//!
//! let to_start = geo_utils::haversine_distance(&here, &route.start().unwrap());
//! assert!(to_start < 200.0);
//! ```

use geo::{BoundingRect, MultiPoint, Point};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, SenderosError};

// Configuration structs
pub mod config;
pub use config::{MapConfig, SenderosConfig, SourceConfig};

// Geographic utilities (haversine distance, degree conversion)
pub mod geo_utils;

// Route and profile value types
pub mod types;
pub use types::{Route, UserProfile};

// SQLite route cache
pub mod cache;
pub use cache::RouteCache;

// Routes API client with cache fallback
pub mod source;
pub use source::{
    AlwaysOnline, Connectivity, HttpRouteSource, NetworkFlag, RouteProvider,
    parse_distance_km, parse_feature_collection,
};

pub use hit_test::RouteHitIndex;

// Map screen session state
pub mod coordinator;
pub use coordinator::{Interaction, LoadPhase, MapCoordinator, MapState};

// Periodic location poll feeding the coordinator
pub mod poller;
pub use poller::{LocationPoller, LocationProvider};

// Identity provider / profile store capabilities
pub mod identity;
pub use identity::{
    AccountService, IdentityProvider, ProfileService, ProfileStore, ProviderFailure, SessionUser,
};

// Account screen state holders
pub mod screens;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("senderos"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// The routes API and the cache store coordinates as `[lon, lat]` pairs; use
/// [`GpsPoint::from_lon_lat`] and [`GpsPoint::to_lon_lat`] at those edges.
///
/// # Example
/// ```
/// use senderos::GpsPoint;
/// let point = GpsPoint::from_lon_lat([-74.0800, 4.6300]); // Bogotá
/// assert_eq!(point.latitude, 4.6300);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build a point from a `[longitude, latitude]` pair.
    pub fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }

    /// The point as a `[longitude, latitude]` pair.
    pub fn to_lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box used to fit the map camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Compute bounds from GPS points. Returns `None` for an empty slice.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        let multi: MultiPoint<f64> = points
            .iter()
            .map(|p| Point::new(p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .into();
        let rect = multi.bounding_rect()?;

        Some(Self {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        })
    }

    /// Center of the bounding box.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Smallest bounds containing both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lng: self.min_lng.min(other.min_lng),
            max_lng: self.max_lng.max(other.max_lng),
        }
    }
}
