//! # Great-circle distance between two fixes

use fleetlink_core::GeoPoint;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between `a` and `b`, in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_have_zero_distance() {
        let p = GeoPoint { lat: 37.0, lon: -122.0 };
        assert!(haversine_m(p, p) < 1e-6);
    }

    #[test]
    fn one_degree_of_longitude_at_the_equator_is_about_111km() {
        let a = GeoPoint { lat: 0.0, lon: 0.0 };
        let b = GeoPoint { lat: 0.0, lon: 1.0 };
        let d = haversine_m(a, b);
        assert!((d - 111_195.0).abs() < 1000.0, "got {d}");
    }
}
