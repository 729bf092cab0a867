//! # Proximity Index
//!
//! Pairwise spatial comparison of two trajectories.
//!
//! For spatial proximity the trajectories are treated as undirected sets of
//! positioned nodes: edge direction and traversal order are irrelevant to
//! whether two people stood in the same microcell. Temporal relevance is a
//! separate filter applied by the engine (see [`crate::engine`]), so a pair
//! returned here may still be discarded for being minutes or hours apart.
//!
//! Complexity is O(|a| × |b|) per trajectory pair. A buffered bounding-box
//! check rejects pairs of trajectories that cannot contain any within-radius
//! node pair before the quadratic scan runs.

use crate::geo_utils;
use crate::{TraceError, Trajectory};

/// A node pair from two compared trajectories, with its measured distance.
///
/// `within_radius` records the inclusive comparison `distance <= radius`
/// against the radius the pair was measured with. Pairs returned by
/// [`find_overlaps`] always satisfy it; the flag travels with the pair so a
/// downstream temporal filter can demote a pair without losing the
/// measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProximityPair {
    /// Node index into the first trajectory.
    pub node_a: usize,
    /// Node index into the second trajectory.
    pub node_b: usize,
    /// Great-circle distance between the two nodes, in meters.
    pub distance_meters: f64,
    pub within_radius: bool,
}

/// Find all node pairs of two trajectories within `radius_meters` of each
/// other.
///
/// Distance is the haversine great-circle distance in meters; the comparison
/// against the radius is inclusive, so a pair at exactly the radius counts as
/// within it. Comparison is symmetric: swapping the two trajectories yields
/// the same pairs with `node_a`/`node_b` swapped.
///
/// A degenerate trajectory (zero nodes) is a valid input and produces an
/// empty result, not an error.
///
/// # Errors
///
/// [`TraceError::InvalidRadius`] if the radius is not a positive, finite
/// number of meters.
pub fn find_overlaps(
    traj_a: &Trajectory,
    traj_b: &Trajectory,
    radius_meters: f64,
) -> Result<Vec<ProximityPair>, TraceError> {
    validate_radius(radius_meters)?;

    if traj_a.is_empty() || traj_b.is_empty() {
        return Ok(Vec::new());
    }

    // Quick reject: buffered bounds that do not intersect cannot hold a
    // within-radius pair.
    if let (Some(ba), Some(bb)) = (traj_a.bounds(), traj_b.bounds()) {
        if !geo_utils::bounds_overlap(ba, bb, radius_meters, ba.center().latitude) {
            return Ok(Vec::new());
        }
    }

    let mut pairs = Vec::new();
    for (i, a) in traj_a.nodes().iter().enumerate() {
        for (j, b) in traj_b.nodes().iter().enumerate() {
            let distance = geo_utils::haversine_distance(&a.point, &b.point);
            if distance <= radius_meters {
                pairs.push(ProximityPair {
                    node_a: i,
                    node_b: j,
                    distance_meters: distance,
                    within_radius: true,
                });
            }
        }
    }

    Ok(pairs)
}

/// Reject non-positive or non-finite radii before any work begins.
pub(crate) fn validate_radius(radius_meters: f64) -> Result<(), TraceError> {
    if radius_meters.is_finite() && radius_meters > 0.0 {
        Ok(())
    } else {
        Err(TraceError::InvalidRadius(radius_meters))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Condition, GeoPoint, LocationSample};
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 4, 7)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn traj(person: &str, points: &[(f64, f64)]) -> Trajectory {
        let samples = points
            .iter()
            .enumerate()
            .map(|(i, &(lat, lng))| LocationSample {
                person_id: person.to_string(),
                point: GeoPoint::new(lat, lng),
                timestamp: ts(17, 10 + i as u32),
                condition: Condition::Healthy,
            })
            .collect();
        Trajectory::build(person, samples).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        let a = traj("a", &[(18.5650, 73.9085)]);
        let b = traj("b", &[(18.5650, 73.9085)]);
        assert!(matches!(
            find_overlaps(&a, &b, 0.0),
            Err(TraceError::InvalidRadius(_))
        ));
        assert!(matches!(
            find_overlaps(&a, &b, -1.0),
            Err(TraceError::InvalidRadius(_))
        ));
        assert!(matches!(
            find_overlaps(&a, &b, f64::NAN),
            Err(TraceError::InvalidRadius(_))
        ));
    }

    #[test]
    fn test_identical_points_overlap() {
        let a = traj("a", &[(18.5650, 73.9085)]);
        let b = traj("b", &[(18.5650, 73.9085)]);
        let pairs = find_overlaps(&a, &b, 2.0).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].node_a, 0);
        assert_eq!(pairs[0].node_b, 0);
        assert_eq!(pairs[0].distance_meters, 0.0);
        assert!(pairs[0].within_radius);
    }

    #[test]
    fn test_kilometer_apart_is_not_within_meters_radius() {
        // ~1.1 km apart in latitude; default-scale radius of 2 m
        let a = traj("a", &[(18.5650, 73.9085)]);
        let b = traj("b", &[(18.5750, 73.9085)]);
        let pairs = find_overlaps(&a, &b, 2.0).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        let a = traj("a", &[(18.5650, 73.9085)]);
        let b = traj("b", &[(18.5651, 73.9086)]);
        let exact = geo_utils::haversine_distance(
            &a.nodes()[0].point,
            &b.nodes()[0].point,
        );

        let at_boundary = find_overlaps(&a, &b, exact).unwrap();
        assert_eq!(at_boundary.len(), 1);

        let just_under = find_overlaps(&a, &b, exact * 0.999).unwrap();
        assert!(just_under.is_empty());
    }

    #[test]
    fn test_longitude_axis_boundary_survives_prefilter() {
        // Single-node trajectories separated along longitude only, radius set
        // to the exact haversine distance. The degenerate bounding boxes leave
        // no slack, so any under-sized degree buffer would reject the pair
        // before the distance is ever computed.
        let a = traj("a", &[(18.5652, 73.90850)]);
        let b = traj("b", &[(18.5652, 73.90853)]);
        let exact = geo_utils::haversine_distance(&a.nodes()[0].point, &b.nodes()[0].point);

        let pairs = find_overlaps(&a, &b, exact).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].within_radius);
    }

    #[test]
    fn test_latitude_axis_boundary_survives_prefilter() {
        let a = traj("a", &[(18.56520, 73.9085)]);
        let b = traj("b", &[(18.56523, 73.9085)]);
        let exact = geo_utils::haversine_distance(&a.nodes()[0].point, &b.nodes()[0].point);

        let pairs = find_overlaps(&a, &b, exact).unwrap();
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_symmetric_under_argument_swap() {
        let a = traj("a", &[(18.5650, 73.9085), (18.5651, 73.9086), (18.5700, 73.9100)]);
        let b = traj("b", &[(18.5651, 73.9086), (18.5650, 73.9085)]);

        let ab = find_overlaps(&a, &b, 20.0).unwrap();
        let ba = find_overlaps(&b, &a, 20.0).unwrap();

        let mut ab_keys: Vec<(usize, usize)> =
            ab.iter().map(|p| (p.node_a, p.node_b)).collect();
        let mut ba_swapped: Vec<(usize, usize)> =
            ba.iter().map(|p| (p.node_b, p.node_a)).collect();
        ab_keys.sort_unstable();
        ba_swapped.sort_unstable();
        assert_eq!(ab_keys, ba_swapped);
    }

    #[test]
    fn test_empty_trajectory_yields_no_pairs() {
        let a = Trajectory::build("a", vec![]).unwrap();
        let b = traj("b", &[(18.5650, 73.9085), (18.5651, 73.9086)]);
        assert!(find_overlaps(&a, &b, 2.0).unwrap().is_empty());
        assert!(find_overlaps(&b, &a, 2.0).unwrap().is_empty());
    }

    #[test]
    fn test_all_close_pairs_reported() {
        // Two nodes each, all four combinations within 200 m
        let a = traj("a", &[(18.5650, 73.9085), (18.5651, 73.9086)]);
        let b = traj("b", &[(18.5650, 73.9086), (18.5651, 73.9085)]);
        let pairs = find_overlaps(&a, &b, 200.0).unwrap();
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn test_bounds_prefilter_never_drops_a_close_pair() {
        // Trajectories whose interiors approach each other while their nodes
        // spread far apart; the buffered-bounds check must keep the pair.
        let a = traj("a", &[(18.5650, 73.9085), (18.6650, 73.9085)]);
        let b = traj("b", &[(18.5650, 73.9086), (18.4650, 73.9086)]);
        let pairs = find_overlaps(&a, &b, 20.0).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].node_a, pairs[0].node_b), (0, 0));
    }
}
