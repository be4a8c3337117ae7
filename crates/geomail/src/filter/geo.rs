//! Distances on the WGS84 ellipsoid and the damping curve

use std::sync::LazyLock;

use geographiclib_rs::{Geodesic, InverseGeodesic};

use crate::models::Coordinates;

static WGS84: LazyLock<Geodesic> = LazyLock::new(Geodesic::wgs84);

/// Geodesic distance between two points, in meters
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let s12: f64 = WGS84.inverse(a.latitude, a.longitude, b.latitude, b.longitude);
    s12
}

/// Match probability at `distance` for a damping filter with `base_distance`
///
/// Halves every `base_distance` meters: 1.0 at zero, 0.5 at `base_distance`.
/// A non-positive base only admits the exact center.
pub fn damping_probability(distance: f64, base_distance: f64) -> f64 {
    if base_distance <= 0.0 {
        return if distance <= 0.0 { 1.0 } else { 0.0 };
    }
    (-distance / base_distance).exp2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = Coordinates::new(55.75222, 37.61556);
        assert_eq!(distance_meters(p, p), 0.0);
    }

    #[test]
    fn test_short_distance() {
        let d = distance_meters(
            Coordinates::new(55.75222, 37.61556),
            Coordinates::new(55.7558, 37.6178),
        );
        assert!(d > 300.0 && d < 500.0, "distance was {d}");
    }

    #[test]
    fn test_symmetric() {
        let a = Coordinates::new(53.3595118, -6.3086148);
        let b = Coordinates::new(-23.5311317, -46.9026668);
        let ab = distance_meters(a, b);
        let ba = distance_meters(b, a);
        assert!((ab - ba).abs() < 1e-6);
        // Dublin to Sao Paulo area is roughly 9,400 km
        assert!(ab > 9_000_000.0 && ab < 10_000_000.0, "distance was {ab}");
    }

    #[test]
    fn test_one_degree_of_latitude_at_equator() {
        let d = distance_meters(Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 0.0));
        assert!((d - 110_574.4).abs() < 1.0, "distance was {d}");
    }

    #[test]
    fn test_damping_anchor_points() {
        assert_eq!(damping_probability(0.0, 1000.0), 1.0);
        assert_eq!(damping_probability(1000.0, 1000.0), 0.5);
        assert_eq!(damping_probability(2000.0, 1000.0), 0.25);
    }

    #[test]
    fn test_damping_strictly_decreasing() {
        let base = 5000.0;
        let mut previous = damping_probability(0.0, base);
        for step in 1..200 {
            let p = damping_probability(step as f64 * 250.0, base);
            assert!(p < previous, "p did not decrease at step {step}");
            previous = p;
        }
    }

    #[test]
    fn test_damping_non_positive_base() {
        assert_eq!(damping_probability(0.0, 0.0), 1.0);
        assert_eq!(damping_probability(1.0, 0.0), 0.0);
    }
}
