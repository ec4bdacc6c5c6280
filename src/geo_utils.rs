//! Geographic utilities: great-circle distance and degree conversion.

use crate::GpsPoint;

/// Earth radius used for navigation-eligibility checks (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Earth radius used for map-tap hit testing (kilometers).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance between two points on a sphere of `radius`.
/// The result is in the unit of `radius`.
pub fn haversine(p1: &GpsPoint, p2: &GpsPoint, radius: f64) -> f64 {
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + p1.latitude.to_radians().cos()
            * p2.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    radius * c
}

/// Haversine distance in meters.
///
/// # Example
/// ```
/// use senderos::{GpsPoint, geo_utils::haversine_distance};
/// let a = GpsPoint::new(4.6300, -74.0800);
/// let b = GpsPoint::new(4.6500, -74.0800);
/// assert_eq!(format!("{:.2}", haversine_distance(&a, &b) / 1000.0), "2.22");
/// ```
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine(p1, p2, EARTH_RADIUS_M)
}

/// Haversine distance in kilometers.
pub fn haversine_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine(p1, p2, EARTH_RADIUS_KM)
}

/// Meters per degree of latitude on the sphere used by [`haversine_distance`].
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Convert a distance in meters to a span in degrees.
///
/// Uses the longitude scale at `latitude`, the larger of the two spans, so
/// a circle of this radius in degree space contains every point within
/// `meters` by haversine distance.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos().abs().max(0.01);
    meters / (METERS_PER_DEGREE * cos_lat)
}
