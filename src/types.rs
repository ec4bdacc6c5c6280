//! App-layer value types: routes and user profiles.

use serde::{Deserialize, Serialize};

use crate::{Bounds, GpsPoint};

// ============================================================================
// Route
// ============================================================================

/// A named walking/cycling route.
///
/// Immutable once built; a re-fetch replaces routes wholesale. When `path`
/// is non-empty the anchor (`latitude`/`longitude`) is its first point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Route {
    pub id: String,
    pub name: String,
    /// Route length in kilometers
    pub distance_km: f64,
    /// Anchor latitude (first path point)
    pub latitude: f64,
    /// Anchor longitude (first path point)
    pub longitude: f64,
    /// Free text; the API sends the expected duration here
    pub description: Option<String>,
    pub path: Vec<GpsPoint>,
}

impl Route {
    /// Build a route with an explicit anchor. The path may be empty; when it
    /// is not, the anchor is taken from its first point instead.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        distance_km: f64,
        anchor: GpsPoint,
        description: Option<String>,
        path: Vec<GpsPoint>,
    ) -> Self {
        let anchor = path.first().copied().unwrap_or(anchor);
        Self {
            id: id.into(),
            name: name.into(),
            distance_km: sanitize_distance(distance_km),
            latitude: anchor.latitude,
            longitude: anchor.longitude,
            description,
            path,
        }
    }

    /// Build a route anchored at the first point of `path`.
    /// Returns `None` when the path is empty.
    pub fn from_path(
        id: impl Into<String>,
        name: impl Into<String>,
        distance_km: f64,
        description: Option<String>,
        path: Vec<GpsPoint>,
    ) -> Option<Self> {
        let anchor = *path.first()?;
        Some(Self::new(id, name, distance_km, anchor, description, path))
    }

    pub fn anchor(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// First path point, where navigation has to begin.
    pub fn start(&self) -> Option<GpsPoint> {
        self.path.first().copied()
    }

    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }

    /// Bounding box of the path (or of the anchor alone for an empty path).
    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.path).unwrap_or_else(|| {
            let a = self.anchor();
            Bounds {
                min_lat: a.latitude,
                max_lat: a.latitude,
                min_lng: a.longitude,
                max_lng: a.longitude,
            }
        })
    }
}

fn sanitize_distance(distance_km: f64) -> f64 {
    if distance_km.is_finite() && distance_km > 0.0 {
        distance_km
    } else {
        0.0
    }
}

// ============================================================================
// User Profile
// ============================================================================

/// Per-user profile document kept in the remote profile store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub alias: String,
    pub display_name: String,
    pub phone_number: String,
    pub photo_url: String,
    pub bio: String,
    /// Unix timestamp (milliseconds)
    pub created_at: i64,
    /// Unix timestamp (milliseconds)
    pub updated_at: i64,
}

impl UserProfile {
    /// Fresh profile with an empty alias, stamped `now_ms`.
    pub fn basic(id: impl Into<String>, email: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            created_at: now_ms,
            updated_at: now_ms,
            ..Self::default()
        }
    }
}
