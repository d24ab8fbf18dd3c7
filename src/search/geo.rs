// Great-circle distance

use crate::search::types::GeoPoint;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance between two points, in meters
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Point `meters` north of `origin`, handy for building fixtures at a known distance
pub fn offset_north(origin: GeoPoint, meters: f64) -> GeoPoint {
    let dlat = (meters / EARTH_RADIUS_M).to_degrees();
    GeoPoint::new(origin.latitude + dlat, origin.longitude)
}
