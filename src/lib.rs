//! # Contact Tracer
//!
//! Contact-tracing overlap detection over per-person GPS trajectories.
//!
//! This library provides:
//! - Trajectory reconstruction from time-ordered location samples
//! - Pairwise spatial-temporal proximity detection (haversine, meters)
//! - Population-wide overlap analysis with deterministic output
//!
//! ## Features
//!
//! - **`parallel`** - Parallel person-pair analysis with rayon
//! - **`cli`** - The `trace-overlaps` batch binary
//! - **`serde`** - Serde derives on the data model
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use contact_tracer::{
//!     analyze, AnalysisConfig, Condition, GeoPoint, LocationSample,
//!     PopulationSnapshot, Trajectory,
//! };
//!
//! let at = NaiveDate::from_ymd_opt(2020, 4, 7).unwrap().and_hms_opt(17, 10, 0).unwrap();
//! let sample = |person: &str| LocationSample {
//!     person_id: person.to_string(),
//!     point: GeoPoint::new(18.5652, 73.9085),
//!     timestamp: at,
//!     condition: Condition::Healthy,
//! };
//!
//! let alice = Trajectory::build("alice", vec![sample("alice")]).unwrap();
//! let bob = Trajectory::build("bob", vec![sample("bob")]).unwrap();
//!
//! let snapshot = PopulationSnapshot::new(vec![alice, bob]).unwrap();
//! let report = analyze(&snapshot, &AnalysisConfig::default()).unwrap();
//! assert_eq!(report.events.len(), 1); // same spot, same minute
//! ```

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod engine;
pub mod geo_utils;
pub mod loader;
pub mod proximity;
pub mod trajectory;

#[cfg(feature = "parallel")]
pub use engine::analyze_parallel;
pub use engine::{
    analyze, analyze_with_cancel, AnalysisConfig, AnalysisReport, CancelFlag, OverlapEvent,
    PopulationSnapshot, SampleRef,
};
pub use loader::{load_csv_path, load_records, LoadMode, LoadSummary};
pub use proximity::{find_overlaps, ProximityPair};
pub use trajectory::{Trajectory, TrajectoryEdge};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude in WGS84 decimal degrees.
///
/// # Example
/// ```
/// use contact_tracer::GeoPoint;
/// let point = GeoPoint::new(18.5652, 73.9085);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box for a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds enclosing a set of points. Returns `None` for empty input.
    pub fn from_points(points: impl IntoIterator<Item = GeoPoint>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for p in points {
            let b = bounds.get_or_insert(Self {
                min_lat: p.latitude,
                max_lat: p.latitude,
                min_lng: p.longitude,
                max_lng: p.longitude,
            });
            b.min_lat = b.min_lat.min(p.latitude);
            b.max_lat = b.max_lat.max(p.latitude);
            b.min_lng = b.min_lng.min(p.longitude);
            b.max_lng = b.max_lng.max(p.longitude);
        }
        bounds
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Recorded health condition of a person at sampling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    Healthy,
    Sick,
}

impl FromStr for Condition {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "healthy" => Ok(Condition::Healthy),
            "sick" => Ok(Condition::Sick),
            other => Err(TraceError::InvalidInput {
                reason: format!("unknown condition '{other}' (expected 'healthy' or 'sick')"),
            }),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Healthy => write!(f, "healthy"),
            Condition::Sick => write!(f, "sick"),
        }
    }
}

/// One geolocation reading for one person.
///
/// Immutable once created. The timestamp combines the record's date and time
/// fields so ordering is correct across day boundaries.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocationSample {
    pub person_id: String,
    pub point: GeoPoint,
    pub timestamp: NaiveDateTime,
    pub condition: Condition,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by trajectory construction, proximity analysis and loading.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Malformed record or a sample that does not belong to the declared person.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Proximity radius must be a positive, finite number of meters.
    #[error("invalid radius: {0} m (must be positive and finite)")]
    InvalidRadius(f64),

    /// Analysis configuration rejected before any work begins.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TraceError {
    pub(crate) fn input(reason: impl Into<String>) -> Self {
        TraceError::InvalidInput { reason: reason.into() }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(18.5652, 73.9085).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounds_from_points() {
        let bounds = Bounds::from_points([
            GeoPoint::new(18.565, 73.907),
            GeoPoint::new(18.566, 73.910),
            GeoPoint::new(18.564, 73.908),
        ])
        .unwrap();
        assert_eq!(bounds.min_lat, 18.564);
        assert_eq!(bounds.max_lat, 18.566);
        assert_eq!(bounds.min_lng, 73.907);
        assert_eq!(bounds.max_lng, 73.910);
    }

    #[test]
    fn test_bounds_from_points_empty() {
        assert!(Bounds::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_condition_parsing() {
        assert_eq!("healthy".parse::<Condition>().unwrap(), Condition::Healthy);
        assert_eq!(" Sick ".parse::<Condition>().unwrap(), Condition::Sick);
        assert!("quarantined".parse::<Condition>().is_err());
    }

    #[test]
    fn test_condition_display_roundtrip() {
        assert_eq!(Condition::Sick.to_string(), "sick");
        assert_eq!(Condition::Healthy.to_string(), "healthy");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_sample_serde_roundtrip() {
        let sample = LocationSample {
            person_id: "QHTWZHH".to_string(),
            point: GeoPoint::new(18.565374, 73.909405),
            timestamp: chrono::NaiveDate::from_ymd_opt(2020, 4, 7)
                .unwrap()
                .and_hms_opt(17, 10, 0)
                .unwrap(),
            condition: Condition::Healthy,
        };
        let json = serde_json::to_string(&sample).unwrap();
        let back: LocationSample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }
}
