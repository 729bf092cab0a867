//! # Geographic Utilities
//!
//! Core geographic computation utilities for trace analysis.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points, in meters |
//! | [`path_length`] | Total length of an ordered point sequence in meters |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//! | [`bounds_overlap`] | Check if two bounding boxes overlap, with a buffer |
//!
//! ## Algorithm Notes
//!
//! The proximity radius this crate works with is on the order of meters, so a
//! naive Euclidean comparison on raw lat/lon degrees is insufficient: a degree
//! of longitude shrinks with latitude while a degree of latitude does not.
//! Every comparison against the radius goes through the haversine formula and
//! happens in meters.
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees),
//! the standard produced by GPS receivers.

use crate::{Bounds, GeoPoint};
use geo::{Distance, Haversine, Point};

/// Meters per degree of arc on the haversine sphere (R = 6,371 km).
///
/// Degree buffers derived from this constant agree with
/// [`haversine_distance`]; a conversion based on the WGS84 equatorial value
/// (111,320 m/degree) comes out ~0.11% short and would let a bounding-box
/// prefilter reject pairs at exactly the radius.
pub(crate) const METERS_PER_DEGREE: f64 = 6_371_000.0 * std::f64::consts::PI / 180.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two points using the Haversine
/// formula.
///
/// Returns the distance in meters along the Earth's surface (spherical Earth,
/// radius 6,371 km). Accurate to within 0.3% for practical purposes, which is
/// far below GPS receiver noise at the microcell scale.
///
/// # Example
///
/// ```rust
/// use contact_tracer::{geo_utils, GeoPoint};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the total length of an ordered point sequence in meters.
///
/// Sums the haversine distance between consecutive points. Empty or
/// single-point sequences return 0.0.
pub fn path_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert meters to degrees of longitude at a given latitude.
///
/// At the equator, 1 degree ≈ 111,195 meters on the haversine sphere; the
/// longitude scale shrinks with `cos(latitude)`, so the returned degree count
/// grows toward the poles. Because `cos(latitude) <= 1` the result is never
/// smaller than the equivalent latitude extent, making it suitable for
/// buffering bounding boxes where a square search area is acceptable.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = METERS_PER_DEGREE * lat_rad.cos().max(1e-6);
    meters / meters_per_degree
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Check if two bounding boxes overlap, expanded by a buffer in meters.
///
/// Used as a cheap spatial prefilter before point-by-point comparison: two
/// trajectories whose buffered bounds do not intersect cannot contain any node
/// pair within `buffer_meters` of each other.
///
/// # Arguments
///
/// * `a` - First bounding box
/// * `b` - Second bounding box
/// * `buffer_meters` - Buffer distance to expand the overlap check
/// * `reference_lat` - Reference latitude for meter-to-degree conversion
pub fn bounds_overlap(a: &Bounds, b: &Bounds, buffer_meters: f64, reference_lat: f64) -> bool {
    // Slight inflation keeps the reject strictly conservative: a node pair at
    // exactly `buffer_meters` apart must never fail the box test.
    let buffer = buffer_meters * 1.01;
    let lat_deg = buffer / METERS_PER_DEGREE;
    let lng_deg = meters_to_degrees(buffer, reference_lat);

    !(a.max_lat + lat_deg < b.min_lat
        || b.max_lat + lat_deg < a.min_lat
        || a.max_lng + lng_deg < b.min_lng
        || b.max_lng + lng_deg < a.min_lng)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GeoPoint::new(18.5652, 73.9085);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0));
    }

    #[test]
    fn test_haversine_distance_symmetric() {
        let a = GeoPoint::new(18.5652, 73.9085);
        let b = GeoPoint::new(18.5655, 73.9091);
        assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
    }

    #[test]
    fn test_one_hundredth_degree_is_about_a_kilometer() {
        // 0.01 degrees of latitude ≈ 1.11 km, regardless of longitude scale
        let a = GeoPoint::new(18.5600, 73.9085);
        let b = GeoPoint::new(18.5700, 73.9085);
        let dist = haversine_distance(&a, &b);
        assert!(approx_eq(dist, 1113.0, 10.0));
    }

    #[test]
    fn test_path_length_empty_and_single() {
        assert_eq!(path_length(&[]), 0.0);
        assert_eq!(path_length(&[GeoPoint::new(18.5652, 73.9085)]), 0.0);
    }

    #[test]
    fn test_path_length_two_points() {
        let path = [
            GeoPoint::new(51.5074, -0.1278),
            GeoPoint::new(51.5080, -0.1280),
        ];
        let length = path_length(&path);
        assert!(length > 0.0);
        assert!(length < 100.0); // about 68 m
    }

    #[test]
    fn test_bounds_overlap_yes() {
        let a = Bounds { min_lat: 18.560, max_lat: 18.566, min_lng: 73.907, max_lng: 73.910 };
        let b = Bounds { min_lat: 18.563, max_lat: 18.570, min_lng: 73.908, max_lng: 73.912 };
        assert!(bounds_overlap(&a, &b, 0.0, 18.56));
    }

    #[test]
    fn test_bounds_overlap_no() {
        let a = Bounds { min_lat: 18.560, max_lat: 18.561, min_lng: 73.907, max_lng: 73.908 };
        let b = Bounds { min_lat: 18.580, max_lat: 18.581, min_lng: 73.930, max_lng: 73.931 };
        assert!(!bounds_overlap(&a, &b, 0.0, 18.56));
    }

    #[test]
    fn test_bounds_overlap_with_buffer() {
        let a = Bounds { min_lat: 18.560, max_lat: 18.561, min_lng: 73.907, max_lng: 73.908 };
        let b = Bounds { min_lat: 18.580, max_lat: 18.581, min_lng: 73.930, max_lng: 73.931 };
        // Disjoint by ~2 km; a 5 km buffer bridges the gap
        assert!(bounds_overlap(&a, &b, 5000.0, 18.56));
    }

    #[test]
    fn test_meters_to_degrees() {
        // At the equator, one degree of arc on the 6,371 km sphere
        let deg = meters_to_degrees(METERS_PER_DEGREE, 0.0);
        assert!(approx_eq(deg, 1.0, 1e-9));

        // At higher latitude, same distance spans more degrees of longitude
        let deg_45 = meters_to_degrees(METERS_PER_DEGREE, 45.0);
        assert!(deg_45 > 1.0);
    }

    #[test]
    fn test_meters_to_degrees_matches_haversine() {
        // Converting a haversine distance back to longitude degrees must not
        // come out smaller than the angular separation it came from.
        let lat = 18.5652;
        let a = GeoPoint::new(lat, 73.90850);
        let b = GeoPoint::new(lat, 73.90853);
        let dist = haversine_distance(&a, &b);
        assert!(meters_to_degrees(dist, lat) >= 0.00003);
    }

    #[test]
    fn test_bounds_overlap_at_exact_buffer_distance() {
        // Two degenerate boxes separated along longitude by precisely the
        // buffer distance must still register as overlapping.
        let lat = 18.5652;
        let a = GeoPoint::new(lat, 73.90850);
        let b = GeoPoint::new(lat, 73.90853);
        let dist = haversine_distance(&a, &b);

        let ba = Bounds { min_lat: lat, max_lat: lat, min_lng: a.longitude, max_lng: a.longitude };
        let bb = Bounds { min_lat: lat, max_lat: lat, min_lng: b.longitude, max_lng: b.longitude };
        assert!(bounds_overlap(&ba, &bb, dist, lat));

        // Same separation along the latitude axis
        let c = GeoPoint::new(lat + 0.00003, 73.90850);
        let dist_lat = haversine_distance(&a, &c);
        let bc = Bounds { min_lat: c.latitude, max_lat: c.latitude, min_lng: c.longitude, max_lng: c.longitude };
        assert!(bounds_overlap(&ba, &bc, dist_lat, lat));
    }
}
