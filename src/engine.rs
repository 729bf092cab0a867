//! # Population Overlap Engine
//!
//! Orchestrates pairwise proximity comparison across a whole population.
//!
//! The engine enumerates every unordered pair of distinct persons exactly
//! once, delegates spatial comparison to [`crate::proximity`], applies the
//! temporal relevance window, and emits a deterministic sequence of
//! [`OverlapEvent`]s ordered by `(person_a, person_b, node_a, node_b)`.
//!
//! An R-tree over per-trajectory bounding boxes (buffered by the radius)
//! prefilters candidate pairs, so trajectories that never came near each
//! other skip the quadratic node scan entirely. The prefilter only discards
//! pairs that provably contain no within-radius node pair; results are
//! identical to the exhaustive scan.
//!
//! Analysis is read-only over a fixed [`PopulationSnapshot`]. With the
//! `parallel` feature, person-pairs are partitioned across rayon workers
//! that write only to local buffers; the merge re-sorts into canonical order.

use crate::geo_utils;
use crate::proximity::{self, find_overlaps};
use crate::{Condition, GeoPoint, TraceError, Trajectory};
use chrono::{Duration, NaiveDateTime};
use log::{info, warn};
use rstar::{RTree, RTreeObject, AABB};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// Snapshot
// ============================================================================

/// The fixed, read-only set of all trajectories analyzed together in one run.
///
/// Owns every trajectory; ordered by person id so that pair enumeration and
/// event ordering are deterministic. Never mutated once analysis begins;
/// concurrent analyses over independent snapshots are safe.
#[derive(Debug, Clone)]
pub struct PopulationSnapshot {
    trajectories: Vec<Trajectory>,
}

impl PopulationSnapshot {
    /// Build a snapshot from per-person trajectories.
    ///
    /// # Errors
    ///
    /// [`TraceError::InvalidInput`] if two trajectories share a person id.
    pub fn new(mut trajectories: Vec<Trajectory>) -> Result<Self, TraceError> {
        trajectories.sort_by(|a, b| a.person_id().cmp(b.person_id()));

        if let Some(dup) = trajectories
            .windows(2)
            .find(|w| w[0].person_id() == w[1].person_id())
        {
            return Err(TraceError::input(format!(
                "duplicate trajectory for person '{}'",
                dup[0].person_id()
            )));
        }

        Ok(Self { trajectories })
    }

    /// All trajectories, ordered by person id.
    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    /// Number of persons in the snapshot.
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Look up one person's trajectory.
    pub fn get(&self, person_id: &str) -> Option<&Trajectory> {
        self.trajectories
            .binary_search_by(|t| t.person_id().cmp(person_id))
            .ok()
            .map(|i| &self.trajectories[i])
    }
}

/// Bounding box of one trajectory, for R-tree indexing.
#[derive(Debug, Clone)]
struct TrajectoryBounds {
    index: usize,
    min_lat: f64,
    max_lat: f64,
    min_lng: f64,
    max_lng: f64,
}

impl RTreeObject for TrajectoryBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_lng, self.min_lat], [self.max_lng, self.max_lat])
    }
}

// ============================================================================
// Configuration & Results
// ============================================================================

/// Configuration for a population overlap analysis.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Microcell radius in meters. Two samples at most this far apart
    /// (inclusive) count as co-located.
    ///
    /// Default: 2.0 m, the social-distance scale. All radii in this crate are
    /// meters; comparisons never happen in raw degrees.
    pub radius_meters: f64,

    /// Temporal relevance window. Two co-located samples only count as a
    /// contact if their timestamps are at most this far apart.
    ///
    /// Default: 60 seconds, one reading interval of the upstream trace
    /// recorder.
    pub time_window: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { radius_meters: 2.0, time_window: Duration::seconds(60) }
    }
}

impl AnalysisConfig {
    /// Fail fast on unusable configuration, before any analysis work.
    pub fn validate(&self) -> Result<(), TraceError> {
        proximity::validate_radius(self.radius_meters)?;
        if self.time_window < Duration::zero() {
            return Err(TraceError::InvalidConfig {
                reason: format!("time window must be non-negative, got {}", self.time_window),
            });
        }
        Ok(())
    }
}

/// Back-reference to one sample inside a snapshot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleRef {
    pub person_id: String,
    /// Node index within the person's trajectory.
    pub node: usize,
    pub point: GeoPoint,
    pub timestamp: NaiveDateTime,
    pub condition: Condition,
}

/// A confirmed proximity breach between two persons.
///
/// Canonically oriented: `a.person_id < b.person_id`. A given unordered
/// sample pair appears at most once per analysis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverlapEvent {
    pub a: SampleRef,
    pub b: SampleRef,
    pub distance_meters: f64,
}

impl OverlapEvent {
    /// Canonical ordering key: `(person_a, person_b, node_a, node_b)`.
    pub fn key(&self) -> (&str, &str, usize, usize) {
        (&self.a.person_id, &self.b.person_id, self.a.node, self.b.node)
    }

    /// Whether either side of the contact was recorded as sick.
    pub fn involves_sick(&self) -> bool {
        self.a.condition == Condition::Sick || self.b.condition == Condition::Sick
    }
}

/// Result of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Confirmed overlap events in canonical order.
    pub events: Vec<OverlapEvent>,
    /// `false` only when the run was cancelled; partial results must never be
    /// mistaken for a complete "no overlaps found".
    pub complete: bool,
    /// Persons in the analyzed snapshot.
    pub persons: usize,
    /// Person-pairs actually compared (after the bounds prefilter).
    pub pairs_compared: usize,
    /// Node pairs within the radius before the temporal filter, for
    /// diagnostics.
    pub pairs_within_radius: usize,
}

/// External cancellation signal, checked between person-pairs.
///
/// Clone freely; all clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The engine aborts at the next person-pair
    /// boundary and returns partial results with `complete = false`.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Analyze a snapshot for contact overlaps.
///
/// Equivalent to [`analyze_with_cancel`] with a flag that never fires.
///
/// # Example
/// ```
/// use contact_tracer::{analyze, AnalysisConfig, PopulationSnapshot};
///
/// let snapshot = PopulationSnapshot::new(vec![]).unwrap();
/// let report = analyze(&snapshot, &AnalysisConfig::default()).unwrap();
/// assert!(report.complete);
/// assert!(report.events.is_empty());
/// ```
pub fn analyze(
    snapshot: &PopulationSnapshot,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, TraceError> {
    analyze_with_cancel(snapshot, config, &CancelFlag::new())
}

/// Analyze a snapshot, aborting early if `cancel` fires.
///
/// The flag is checked between person-pairs (coarse-grained); an in-flight
/// node scan always finishes. A cancelled run returns the events collected so
/// far with `complete = false`.
///
/// # Errors
///
/// [`TraceError::InvalidRadius`] / [`TraceError::InvalidConfig`] if the
/// configuration is unusable; raised before any comparison work.
pub fn analyze_with_cancel(
    snapshot: &PopulationSnapshot,
    config: &AnalysisConfig,
    cancel: &CancelFlag,
) -> Result<AnalysisReport, TraceError> {
    config.validate()?;

    let start = std::time::Instant::now();
    let pairs = candidate_pairs(snapshot, config.radius_meters);
    info!(
        "analyzing {} persons: {} candidate pairs after bounds prefilter",
        snapshot.len(),
        pairs.len()
    );

    let mut events = Vec::new();
    let mut pairs_compared = 0;
    let mut pairs_within_radius = 0;
    let mut complete = true;

    for &(i, j) in &pairs {
        if cancel.is_cancelled() {
            complete = false;
            break;
        }
        let outcome = compare_pair(snapshot, i, j, config)?;
        pairs_compared += 1;
        pairs_within_radius += outcome.raw_pairs;
        events.extend(outcome.events);
    }

    Ok(finish_report(events, complete, snapshot.len(), pairs_compared, pairs_within_radius, start))
}

/// Parallel variant of [`analyze_with_cancel`], partitioning person-pairs
/// across rayon workers.
///
/// Each worker reads the shared snapshot and writes only to its own buffer;
/// the merge re-sorts events into canonical order, so output is identical to
/// the sequential engine.
#[cfg(feature = "parallel")]
pub fn analyze_parallel(
    snapshot: &PopulationSnapshot,
    config: &AnalysisConfig,
    cancel: &CancelFlag,
) -> Result<AnalysisReport, TraceError> {
    use rayon::prelude::*;

    config.validate()?;

    let start = std::time::Instant::now();
    let pairs = candidate_pairs(snapshot, config.radius_meters);
    info!(
        "analyzing {} persons in parallel: {} candidate pairs",
        snapshot.len(),
        pairs.len()
    );

    let outcomes: Vec<Option<PairOutcome>> = pairs
        .par_iter()
        .map(|&(i, j)| {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            compare_pair(snapshot, i, j, config).map(Some)
        })
        .collect::<Result<_, TraceError>>()?;

    let mut events = Vec::new();
    let mut pairs_compared = 0;
    let mut pairs_within_radius = 0;
    let mut complete = true;

    for outcome in outcomes {
        match outcome {
            Some(o) => {
                pairs_compared += 1;
                pairs_within_radius += o.raw_pairs;
                events.extend(o.events);
            }
            None => complete = false,
        }
    }

    Ok(finish_report(events, complete, snapshot.len(), pairs_compared, pairs_within_radius, start))
}

struct PairOutcome {
    raw_pairs: usize,
    events: Vec<OverlapEvent>,
}

/// Enumerate unordered candidate person-pairs, exactly once each.
///
/// Uses an R-tree over trajectory bounds buffered by the radius; `i < j`
/// filters out self-pairs and the symmetric duplicate. The pair list is
/// sorted so iteration (and therefore cancellation cut-off) is deterministic.
fn candidate_pairs(snapshot: &PopulationSnapshot, radius_meters: f64) -> Vec<(usize, usize)> {
    let bounds: Vec<TrajectoryBounds> = snapshot
        .trajectories()
        .iter()
        .enumerate()
        .filter_map(|(index, t)| {
            t.bounds().map(|b| TrajectoryBounds {
                index,
                min_lat: b.min_lat,
                max_lat: b.max_lat,
                min_lng: b.min_lng,
                max_lng: b.max_lng,
            })
        })
        .collect();

    let rtree = RTree::bulk_load(bounds.clone());
    let mut pairs = Vec::new();

    for tb in &bounds {
        // The longitude conversion is never smaller than the latitude extent,
        // so one square buffer covers both axes; the slight inflation keeps
        // the envelope conservative at exactly-radius separations.
        let buffer =
            geo_utils::meters_to_degrees(radius_meters * 1.01, (tb.min_lat + tb.max_lat) / 2.0);
        let search = AABB::from_corners(
            [tb.min_lng - buffer, tb.min_lat - buffer],
            [tb.max_lng + buffer, tb.max_lat + buffer],
        );

        for other in rtree.locate_in_envelope_intersecting(&search) {
            if tb.index < other.index {
                pairs.push((tb.index, other.index));
            }
        }
    }

    pairs.sort_unstable();
    pairs
}

/// Compare one person-pair: spatial scan, then the temporal relevance filter.
fn compare_pair(
    snapshot: &PopulationSnapshot,
    i: usize,
    j: usize,
    config: &AnalysisConfig,
) -> Result<PairOutcome, TraceError> {
    let traj_a = &snapshot.trajectories()[i];
    let traj_b = &snapshot.trajectories()[j];

    let raw = find_overlaps(traj_a, traj_b, config.radius_meters)?;
    let raw_pairs = raw.len();

    let events = raw
        .into_iter()
        .filter(|p| {
            let ta = traj_a.nodes()[p.node_a].timestamp;
            let tb = traj_b.nodes()[p.node_b].timestamp;
            let apart = if ta >= tb { ta - tb } else { tb - ta };
            apart <= config.time_window
        })
        .map(|p| {
            let sa = &traj_a.nodes()[p.node_a];
            let sb = &traj_b.nodes()[p.node_b];
            // Snapshot order guarantees person_id(i) < person_id(j), so the
            // canonical orientation falls out of the index order.
            OverlapEvent {
                a: SampleRef {
                    person_id: sa.person_id.clone(),
                    node: p.node_a,
                    point: sa.point,
                    timestamp: sa.timestamp,
                    condition: sa.condition,
                },
                b: SampleRef {
                    person_id: sb.person_id.clone(),
                    node: p.node_b,
                    point: sb.point,
                    timestamp: sb.timestamp,
                    condition: sb.condition,
                },
                distance_meters: p.distance_meters,
            }
        })
        .collect();

    Ok(PairOutcome { raw_pairs, events })
}

fn finish_report(
    mut events: Vec<OverlapEvent>,
    complete: bool,
    persons: usize,
    pairs_compared: usize,
    pairs_within_radius: usize,
    start: std::time::Instant,
) -> AnalysisReport {
    // Worker buffers arrive in arbitrary order; canonical order is
    // re-established here.
    events.sort_by(|x, y| x.key().cmp(&y.key()));

    if complete {
        info!(
            "analysis complete: {} events from {} pairs in {:?}",
            events.len(),
            pairs_compared,
            start.elapsed()
        );
    } else {
        warn!(
            "analysis cancelled after {} pairs: returning {} partial events",
            pairs_compared,
            events.len()
        );
    }

    AnalysisReport { events, complete, persons, pairs_compared, pairs_within_radius }
}

// ============================================================================
// Tests
// ============================================================================
