//! # Map Coordinator
//!
//! Session state of the map screen: where the user is, which routes are
//! nearby, the distance filter, the selected route and the navigation path.
//!
//! ## State
//!
//! All state lives in a [`MapState`] snapshot held by a `tokio::sync::watch`
//! channel. Every operation applies its changes in a single `send_modify`, so
//! subscribers see each operation as one update (clearing a selection never
//! shows a half-cleared state).
//!
//! Two independent machines are derived from the snapshot:
//! - [`LoadPhase`]: Idle → Loading → Loaded | Error
//! - [`Interaction`]: NoSelection → Selected → Navigating
//!
//! ## Concurrency
//!
//! `load_nearby` may run concurrently with location updates and with other
//! loads. There is no ordering token: the last load to complete wins.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::geo_utils::haversine_distance;
use crate::hit_test::RouteHitIndex;
use crate::source::RouteProvider;
use crate::{Bounds, GpsPoint, MapConfig, Result, Route, SenderosError};

/// Shown when the device is offline but cached routes were served.
pub const OFFLINE_NOTICE: &str = "Offline mode: showing saved routes";

/// Shown when the device is offline and nothing is cached.
pub const OFFLINE_NO_DATA: &str = "No connection and no saved routes";

// ============================================================================
// State
// ============================================================================

/// Route retrieval phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LoadPhase {
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Route interaction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Interaction {
    NoSelection,
    Selected,
    Navigating,
}

/// Immutable snapshot of the map screen state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    pub current_location: Option<GpsPoint>,
    /// Everything the last successful load returned
    pub routes: Vec<Route>,
    /// `routes` after the distance filter
    pub filtered_routes: Vec<Route>,
    pub is_loading: bool,
    /// Set once a load has succeeded
    pub loaded: bool,
    /// Fetch failure message
    pub error_message: Option<String>,
    /// The failed fetch may succeed if retried (show a retry action)
    pub can_retry: bool,
    /// Informational banner (offline mode)
    pub notice: Option<String>,
    pub is_offline: bool,
    pub selected_route: Option<Route>,
    /// `[current location, route start]` once navigation has started
    pub navigation_path: Option<Vec<GpsPoint>>,
    /// Center of the start zone drawn around the selected route's start
    pub start_zone: Option<GpsPoint>,
    /// Upper bound on route length in kilometers
    pub max_distance_km: Option<f64>,
    /// Navigation-eligibility failure, transient
    pub validation_message: Option<String>,
    /// Location the camera should center on once
    pub recenter_on: Option<GpsPoint>,
}

impl MapState {
    pub fn load_phase(&self) -> LoadPhase {
        if self.is_loading {
            LoadPhase::Loading
        } else if self.error_message.is_some() {
            LoadPhase::Error
        } else if self.loaded {
            LoadPhase::Loaded
        } else {
            LoadPhase::Idle
        }
    }

    pub fn interaction(&self) -> Interaction {
        if self.navigation_path.is_some() {
            Interaction::Navigating
        } else if self.selected_route.is_some() {
            Interaction::Selected
        } else {
            Interaction::NoSelection
        }
    }

    /// Area the camera should fit: the selected route, else every visible route.
    pub fn focus_bounds(&self) -> Option<Bounds> {
        if let Some(route) = &self.selected_route {
            return Some(route.bounds());
        }
        self.filtered_routes
            .iter()
            .map(Route::bounds)
            .reduce(|acc, b| acc.union(&b))
    }

    fn apply_filter(&mut self) {
        self.filtered_routes = match self.max_distance_km {
            Some(max) => self
                .routes
                .iter()
                .filter(|r| r.distance_km <= max)
                .cloned()
                .collect(),
            None => self.routes.clone(),
        };
    }
}

// ============================================================================
// Navigation Eligibility
// ============================================================================

/// Check whether navigation of `route` may begin from `location`.
///
/// Returns the navigation path `[location, route start]`, or a
/// [`SenderosError::Validation`] carrying the user-facing reason.
pub fn navigation_start(
    location: Option<GpsPoint>,
    route: &Route,
    start_zone_radius_m: f64,
) -> Result<Vec<GpsPoint>> {
    let location = location.ok_or_else(|| {
        SenderosError::Validation("Could not get your current location".to_string())
    })?;

    let start = route.start().ok_or_else(|| {
        SenderosError::Validation("This route has no valid coordinates".to_string())
    })?;

    let distance_m = haversine_distance(&location, &start);
    if distance_m > start_zone_radius_m {
        return Err(SenderosError::Validation(format!(
            "You must be near the start of the route to begin (maximum {:.0} m). \
             You are {:.2} km from the starting point.",
            start_zone_radius_m,
            distance_m / 1000.0
        )));
    }

    Ok(vec![location, start])
}

// ============================================================================
// Coordinator
// ============================================================================

/// Owner of the map screen session state.
pub struct MapCoordinator<S: RouteProvider> {
    source: Arc<S>,
    config: MapConfig,
    state: watch::Sender<MapState>,
}

impl<S: RouteProvider> MapCoordinator<S> {
    /// Create a coordinator with default configuration.
    pub fn new(source: Arc<S>) -> Self {
        Self::with_config(source, MapConfig::default())
    }

    pub fn with_config(source: Arc<S>, config: MapConfig) -> Self {
        let (state, _) = watch::channel(MapState::default());
        Self {
            source,
            config,
            state,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Current state.
    pub fn snapshot(&self) -> MapState {
        self.state.borrow().clone()
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<MapState> {
        self.state.subscribe()
    }

    // ========================================================================
    // Location
    // ========================================================================

    /// Record a new device location.
    ///
    /// Returns `true` when no routes are loaded and no load is running, i.e.
    /// the caller should fetch routes around this location. The camera is
    /// asked to recenter on it in that case.
    pub fn update_location(&self, location: GpsPoint) -> bool {
        let mut should_fetch = false;
        self.state.send_modify(|s| {
            s.current_location = Some(location);
            if s.routes.is_empty() && !s.is_loading {
                s.recenter_on = Some(location);
                should_fetch = true;
            }
        });
        should_fetch
    }

    /// The camera has been recentered.
    pub fn acknowledge_recenter(&self) {
        self.state.send_if_modified(|s| s.recenter_on.take().is_some());
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load routes around (`lat`, `lng`).
    ///
    /// Missing coordinates default to the current location, then to the
    /// configured default location.
    pub async fn load_nearby(&self, lat: Option<f64>, lng: Option<f64>, force_refresh: bool) {
        let online = self.source.is_online();
        let current = self.state.borrow().current_location;
        let fallback = self.config.default_location;
        let lat = lat
            .or(current.map(|l| l.latitude))
            .unwrap_or(fallback.latitude);
        let lng = lng
            .or(current.map(|l| l.longitude))
            .unwrap_or(fallback.longitude);

        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error_message = None;
            s.can_retry = false;
            s.notice = None;
            s.is_offline = !online;
        });

        debug!(
            "[MapCoordinator] Loading routes near ({:.5}, {:.5}), online={}",
            lat, lng, online
        );
        let result = self.source.fetch_nearby(lat, lng, force_refresh).await;

        self.state.send_modify(|s| {
            match result {
                Ok(routes) => {
                    info!("[MapCoordinator] Loaded {} routes", routes.len());
                    s.routes = routes;
                    s.loaded = true;
                    s.apply_filter();
                    if !online && !s.routes.is_empty() {
                        s.notice = Some(OFFLINE_NOTICE.to_string());
                    }
                }
                Err(e) => {
                    warn!("[MapCoordinator] Route load failed: {}", e);
                    let message = if !online || matches!(e, SenderosError::Offline) {
                        OFFLINE_NO_DATA.to_string()
                    } else {
                        format!("Could not load routes: {}", e)
                    };
                    s.error_message = Some(message);
                    s.can_retry = e.is_retryable();
                }
            }
            s.is_loading = false;
        });
    }

    /// Reload around the current location with `force_refresh` set.
    pub async fn refresh_routes(&self) {
        let current = self.state.borrow().current_location;
        self.load_nearby(
            current.map(|l| l.latitude),
            current.map(|l| l.longitude),
            true,
        )
        .await;
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    /// Recompute the filtered list from the full list and the threshold.
    pub fn apply_filter(&self) {
        self.state.send_modify(MapState::apply_filter);
    }

    /// Keep only routes no longer than `max_km` (`None` disables the filter).
    pub fn set_max_distance_filter(&self, max_km: Option<f64>) {
        self.state.send_modify(|s| {
            s.max_distance_km = max_km;
            s.apply_filter();
        });
    }

    pub fn clear_filters(&self) {
        self.set_max_distance_filter(None);
    }

    // ========================================================================
    // Selection & Navigation
    // ========================================================================

    pub fn select_route(&self, route: Route) {
        self.state.send_modify(|s| {
            if let Some(start) = route.start() {
                s.start_zone = Some(start);
            }
            s.selected_route = Some(route);
        });
    }

    /// Drop the selection together with its navigation path and start zone.
    pub fn clear_selection(&self) {
        self.state.send_modify(|s| {
            s.selected_route = None;
            s.navigation_path = None;
            s.start_zone = None;
        });
    }

    /// Visible route under a map tap, if any.
    pub fn route_at(&self, tap: GpsPoint) -> Option<Route> {
        let state = self.state.borrow();
        let index = RouteHitIndex::build(&state.filtered_routes);
        index
            .hit(&tap, self.config.tap_tolerance_km)
            .map(|idx| state.filtered_routes[idx].clone())
    }

    /// Select the route under a map tap. Returns whether one was hit.
    pub fn select_route_at(&self, tap: GpsPoint) -> bool {
        match self.route_at(tap) {
            Some(route) => {
                debug!("[MapCoordinator] Tap selected route {}", route.id);
                self.select_route(route);
                true
            }
            None => false,
        }
    }

    /// Begin navigating `route` if the user is inside its start zone.
    ///
    /// On failure the navigation path is left untouched and a validation
    /// message explains why.
    pub fn start_navigation(&self, route: &Route) -> bool {
        let location = self.state.borrow().current_location;
        match navigation_start(location, route, self.config.start_zone_radius_m) {
            Ok(path) => {
                info!("[MapCoordinator] Navigation started on route {}", route.id);
                self.state.send_modify(|s| {
                    s.navigation_path = Some(path);
                    s.validation_message = None;
                });
                true
            }
            Err(e) => {
                debug!("[MapCoordinator] Navigation refused: {}", e);
                self.state.send_modify(|s| {
                    s.validation_message = Some(e.to_string());
                });
                false
            }
        }
    }

    pub fn clear_navigation(&self) {
        self.state.send_modify(|s| s.navigation_path = None);
    }

    // ========================================================================
    // Messages
    // ========================================================================

    pub fn clear_validation_message(&self) {
        self.state.send_modify(|s| s.validation_message = None);
    }

    pub fn clear_error_message(&self) {
        self.state.send_modify(|s| {
            s.error_message = None;
            s.can_retry = false;
            s.notice = None;
        });
    }
}
