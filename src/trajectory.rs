//! # Trajectory Builder
//!
//! Converts one person's location samples into a time-ordered trajectory:
//! nodes are samples indexed `0..n-1` in time order, edges connect every
//! temporally adjacent pair and carry the timestamp of the destination node.
//!
//! Spatial comparison (see [`crate::proximity`]) operates on the node
//! positions only; the edge list is a second view over the same node array,
//! kept for travel-history traversal.

use crate::geo_utils;
use crate::{Bounds, GeoPoint, LocationSample, TraceError};
use chrono::NaiveDateTime;

/// A directed transition between two temporally adjacent samples.
///
/// `at` is the timestamp of the destination node, i.e. when the person was
/// next seen after leaving node `from`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrajectoryEdge {
    pub from: usize,
    pub to: usize,
    pub at: NaiveDateTime,
}

/// One person's travel history: samples sorted by time plus derived adjacency.
///
/// Created once per person and read-only thereafter. A trajectory with zero
/// samples is valid (a person present in the roster with no readings); it has
/// no edges and contributes nothing to overlap analysis.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trajectory {
    person_id: String,
    samples: Vec<LocationSample>,
    edges: Vec<TrajectoryEdge>,
    bounds: Option<Bounds>,
}

impl Trajectory {
    /// Build a trajectory for `person_id` from its samples.
    ///
    /// Samples are sorted by timestamp ascending; ties keep their original
    /// input order (stable sort), so identical inputs always produce identical
    /// trajectories. Empty input yields a valid zero-node trajectory.
    ///
    /// # Errors
    ///
    /// [`TraceError::InvalidInput`] if any sample's `person_id` does not match
    /// the declared owner.
    pub fn build(
        person_id: &str,
        mut samples: Vec<LocationSample>,
    ) -> Result<Self, TraceError> {
        if let Some(stray) = samples.iter().find(|s| s.person_id != person_id) {
            return Err(TraceError::input(format!(
                "sample for '{}' handed to trajectory of '{}'",
                stray.person_id, person_id
            )));
        }

        // Vec::sort_by is stable, which is what keeps tie-breaking deterministic.
        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let edges = samples
            .windows(2)
            .enumerate()
            .map(|(i, w)| TrajectoryEdge { from: i, to: i + 1, at: w[1].timestamp })
            .collect();

        let bounds = Bounds::from_points(samples.iter().map(|s| s.point));

        log::debug!(
            "built trajectory for {}: {} nodes, {} edges",
            person_id,
            samples.len(),
            samples.len().saturating_sub(1)
        );

        Ok(Self { person_id: person_id.to_string(), samples, edges, bounds })
    }

    /// The person this trajectory belongs to.
    pub fn person_id(&self) -> &str {
        &self.person_id
    }

    /// Nodes in time order.
    pub fn nodes(&self) -> &[LocationSample] {
        &self.samples
    }

    /// Node at index `i`, if present.
    pub fn node(&self, i: usize) -> Option<&LocationSample> {
        self.samples.get(i)
    }

    /// Transitions between temporally adjacent nodes. Empty for trajectories
    /// with fewer than two nodes.
    pub fn edges(&self) -> &[TrajectoryEdge] {
        &self.edges
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether this trajectory has no nodes.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Bounding box of all node positions; `None` for an empty trajectory.
    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    /// Total distance traveled along the trajectory in meters.
    pub fn path_length_meters(&self) -> f64 {
        let points: Vec<GeoPoint> = self.samples.iter().map(|s| s.point).collect();
        geo_utils::path_length(&points)
    }
}

// ============================================================================
// Tests
// ============================================================================
