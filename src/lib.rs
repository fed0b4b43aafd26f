//! # Segment Engine
//!
//! Training segment detection and cross-ride segment matching for cycling
//! telemetry.
//!
//! This library provides:
//! - Segment detection from raw activity streams (gradient changes, long stops)
//! - Per-segment characterization: terrain, effort aggregates, Normalized Power, quality
//! - Derived classifiers: obstruction, topology, training zones, confidence
//! - Segment library matching with R-tree prefiltering
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel batch detection and library matching with rayon
//! - **`serde`** - Serialize/deserialize configs and results
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use segment_engine::{
//!     ActivityStreams, GpsPoint, SegmentConfig, SegmentDetector,
//!     SegmentMatchConfig, StoredSegment, find_matching_segments,
//! };
//!
//! // ~2.6km heading north, climbing at 5%
//! let n = 240;
//! let coords: Vec<GpsPoint> = (0..n)
//!     .map(|i| GpsPoint::new(51.5 + i as f64 * 0.0001, -0.12))
//!     .collect();
//! let altitude: Vec<f64> = (0..n).map(|i| 30.0 + i as f64 * 0.55).collect();
//!
//! let streams = ActivityStreams::new(coords)
//!     .with_altitude(altitude)
//!     .with_velocity(vec![6.0; n]);
//!
//! let detector = SegmentDetector::new(SegmentConfig::default()).unwrap();
//! let result = detector.detect(&streams);
//!
//! for segment in &result.segments {
//!     println!(
//!         "{}: {:.0}m at {:.1}%",
//!         segment.terrain_type, segment.distance_meters, segment.avg_gradient
//!     );
//! }
//!
//! // Match against a library of previously stored segments
//! let library = vec![StoredSegment::from_detected("climb-1", &result.segments[0])];
//! let config = SegmentMatchConfig::default();
//! let matches = find_matching_segments(&result.segments[0], &library, &config);
//! assert_eq!(matches[0].segment_id, "climb-1");
//! ```

pub mod error;
pub use error::{Result, SegmentError};

pub mod config;
pub use config::{SegmentConfig, SegmentMatchConfig};

pub mod geo_utils;

// Detection pipeline, in dependency order
pub mod stream;
pub use stream::{ActivityStreams, StreamPoint};

pub mod stops;
pub use stops::{DetectedStop, StopClassification};

pub mod gradient;
pub use gradient::{BoundaryPoint, BoundaryReason, BoundaryTracker};

pub mod candidates;
pub use candidates::CandidateSegment;

pub mod characterize;
pub use characterize::{DetectedSegment, TerrainType};

pub mod detector;
pub use detector::{DetectionResult, SegmentDetector};

// Consumers of characterized segments
pub mod classify;
pub use classify::{
    analyze_obstruction, calculate_confidence_score, calculate_consistency_score,
    calculate_relevance_score, classify_frequency_tier, classify_hr_zone, classify_power_zone,
    classify_topology, FrequencyTier, ObstructionAnalysis, Topology, TrainingZone,
};

pub mod dedup;
pub use dedup::{
    find_matching_segments, resolve_library_action, LibraryAction, MatchDirection,
    SegmentLibraryIndex, SegmentMatch, StoredSegment,
};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("SegmentEngineRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use segment_engine::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
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

/// Bounding box for a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{info, warn};

    /// Detect segments in one ride.
    /// Returns `None` if the configuration is invalid.
    #[uniffi::export]
    pub fn ffi_detect_segments(
        streams: ActivityStreams,
        config: SegmentConfig,
    ) -> Option<DetectionResult> {
        init_logging();
        info!(
            "[SegmentEngineRust] detect_segments called with {} points",
            streams.latlng.len()
        );

        match SegmentDetector::new(config) {
            Ok(detector) => Some(detector.detect(&streams)),
            Err(e) => {
                warn!("[SegmentEngineRust] {}", e);
                None
            }
        }
    }

    /// Detect segments across many rides (parallel).
    #[uniffi::export]
    pub fn ffi_detect_segments_batch(
        rides: Vec<ActivityStreams>,
        config: SegmentConfig,
    ) -> Vec<DetectionResult> {
        init_logging();
        let start = std::time::Instant::now();

        let results = match SegmentDetector::new(config) {
            Ok(detector) => detector.detect_batch(&rides),
            Err(e) => {
                warn!("[SegmentEngineRust] {}", e);
                return Vec::new();
            }
        };

        info!(
            "[SegmentEngineRust] Detected {} segments across {} rides in {:?}",
            results.iter().map(|r| r.segments.len()).sum::<usize>(),
            rides.len(),
            start.elapsed()
        );
        results
    }

    /// Match a detected segment against caller-prefiltered library segments.
    #[uniffi::export]
    pub fn ffi_find_matching_segments(
        segment: DetectedSegment,
        candidates: Vec<StoredSegment>,
        config: SegmentMatchConfig,
    ) -> Vec<SegmentMatch> {
        init_logging();
        let matches = find_matching_segments(&segment, &candidates, &config);
        info!(
            "[SegmentEngineRust] {} of {} candidates matched",
            matches.len(),
            candidates.len()
        );
        matches
    }

    /// Prefilter the whole library by bounding box, then match.
    #[uniffi::export]
    pub fn ffi_match_against_library(
        segment: DetectedSegment,
        library: Vec<StoredSegment>,
        config: SegmentMatchConfig,
    ) -> Vec<SegmentMatch> {
        init_logging();
        SegmentLibraryIndex::new(library).find_matches(&segment, &config)
    }

    /// Decide between merging into the best match and inserting a new segment.
    #[uniffi::export]
    pub fn ffi_resolve_library_action(
        matches: Vec<SegmentMatch>,
        merge_threshold: f64,
    ) -> LibraryAction {
        resolve_library_action(&matches, merge_threshold)
    }

    #[uniffi::export]
    pub fn ffi_analyze_obstruction(segment: DetectedSegment) -> ObstructionAnalysis {
        analyze_obstruction(&segment)
    }

    #[uniffi::export]
    pub fn ffi_classify_topology(segment: DetectedSegment) -> Topology {
        classify_topology(&segment.coordinates)
    }

    #[uniffi::export]
    pub fn ffi_classify_power_zone(avg_power: f64, ftp: f64) -> TrainingZone {
        classify_power_zone(avg_power, ftp)
    }

    #[uniffi::export]
    pub fn ffi_classify_hr_zone(avg_heart_rate: f64, max_heart_rate: f64) -> TrainingZone {
        classify_hr_zone(avg_heart_rate, max_heart_rate)
    }

    /// Get default detection configuration.
    #[uniffi::export]
    pub fn default_segment_config() -> SegmentConfig {
        init_logging();
        info!("[SegmentEngineRust] default_segment_config called - Rust is active!");
        SegmentConfig::default()
    }

    /// Get default matching configuration.
    #[uniffi::export]
    pub fn default_segment_match_config() -> SegmentMatchConfig {
        SegmentMatchConfig::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounds_center() {
        let bounds = Bounds {
            min_lat: 51.0,
            max_lat: 52.0,
            min_lng: -1.0,
            max_lng: 0.0,
        };
        assert_eq!(bounds.center(), GpsPoint::new(51.5, -0.5));
    }

    #[test]
    fn test_detect_then_match_roundtrip() {
        let n = 300;
        let coords: Vec<GpsPoint> = (0..n)
            .map(|i| GpsPoint::new(51.5 + i as f64 * 0.0001, -0.12))
            .collect();
        let streams = ActivityStreams::new(coords)
            .with_altitude(vec![15.0; n])
            .with_velocity(vec![9.0; n]);

        let result = SegmentDetector::default().detect(&streams);
        assert_eq!(result.segments.len(), 1);
        let segment = &result.segments[0];
        assert!(segment.distance_meters >= 500.0);
        assert!(segment.start_idx < segment.end_idx);

        let mut library = SegmentLibraryIndex::new(Vec::new());
        let first = library.find_matches(segment, &SegmentMatchConfig::default());
        assert_eq!(resolve_library_action(&first, 0.8), LibraryAction::Insert);

        library.insert(StoredSegment::from_detected("seg-1", segment));
        let second = library.find_matches(segment, &SegmentMatchConfig::default());
        assert!(matches!(
            resolve_library_action(&second, 0.8),
            LibraryAction::Merge { ref segment_id, .. } if segment_id == "seg-1"
        ));
    }

    #[test]
    fn test_derived_classifiers_on_detected_segment() {
        let n = 300;
        let coords: Vec<GpsPoint> = (0..n)
            .map(|i| GpsPoint::new(51.5 + i as f64 * 0.0001, -0.12))
            .collect();
        let streams = ActivityStreams::new(coords)
            .with_velocity(vec![9.0; n])
            .with_watts(vec![210.0; n]);

        let result = SegmentDetector::default().detect(&streams);
        let segment = &result.segments[0];

        assert_eq!(classify_topology(&segment.coordinates), Topology::PointToPoint);
        let power = segment.avg_power.unwrap_or(0.0);
        assert_eq!(classify_power_zone(power, 250.0), TrainingZone::Tempo);

        let obstruction = analyze_obstruction(segment);
        assert!(obstruction.suitable_for_recovery);
        assert!(obstruction.suitable_for_intervals);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_detection_result_serializes() {
        let coords: Vec<GpsPoint> = (0..150)
            .map(|i| GpsPoint::new(51.5 + i as f64 * 0.0001, -0.12))
            .collect();
        let result = SegmentDetector::default()
            .detect(&ActivityStreams::new(coords).with_velocity(vec![8.0; 150]));

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"terrain_type\":\"flat\""));
        let back: DetectionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
