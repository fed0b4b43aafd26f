//! # Segment Detector
//!
//! Runs the full detection pipeline over one ride:
//!
//! ```text
//! streams → build → smooth → stops → gradients → boundaries
//!         → candidates → merge → characterize → DetectionResult
//! ```
//!
//! The detector holds nothing but a validated config, so one instance can be
//! shared freely and rides can be processed independently in parallel.

use std::time::Instant;

use log::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::candidates::{build_candidates, merge_candidates};
use crate::characterize::{characterize_segment, DetectedSegment};
use crate::config::SegmentConfig;
use crate::error::Result;
use crate::gradient::{compute_gradients, find_boundaries};
use crate::stops::{detect_stops, DetectedStop};
use crate::stream::{build_stream, elevation_gain_loss, smooth_elevation, ActivityStreams};

/// Everything detected in one ride.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectionResult {
    /// Segments in ride order
    pub segments: Vec<DetectedSegment>,
    /// Every stop in the ride, in order
    pub stops: Vec<DetectedStop>,
    /// Usable points after invalid coordinates were dropped
    pub total_points: u32,
    pub total_distance: f64,
    pub total_duration: f64,
    pub total_elevation_gain: f64,
    pub total_elevation_loss: f64,
}

/// Detection engine configured once at construction.
///
/// # Example
/// ```
/// use segment_engine::{ActivityStreams, GpsPoint, SegmentConfig, SegmentDetector, TerrainType};
///
/// let coords: Vec<GpsPoint> = (0..200)
///     .map(|i| GpsPoint::new(45.0 + i as f64 * 0.0001, 7.0))
///     .collect();
/// let streams = ActivityStreams::new(coords)
///     .with_altitude(vec![120.0; 200])
///     .with_velocity(vec![8.0; 200]);
///
/// let detector = SegmentDetector::new(SegmentConfig::default()).unwrap();
/// let result = detector.detect(&streams);
///
/// assert_eq!(result.segments.len(), 1);
/// assert_eq!(result.segments[0].terrain_type, TerrainType::Flat);
/// ```
#[derive(Debug, Clone)]
pub struct SegmentDetector {
    config: SegmentConfig,
}

impl Default for SegmentDetector {
    fn default() -> Self {
        Self {
            config: SegmentConfig::default(),
        }
    }
}

impl SegmentDetector {
    /// Validate `config` and build a detector around it.
    pub fn new(config: SegmentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Detect segments and stops in one ride.
    ///
    /// Never fails: too few usable points gives an empty result, and missing
    /// channels fall back to defaults.
    pub fn detect(&self, streams: &ActivityStreams) -> DetectionResult {
        let config = &self.config;
        let started = Instant::now();

        let mut points = build_stream(streams, config);
        if points.len() < config.min_points as usize {
            debug!(
                "[SegmentDetector] {} usable points, need {}; nothing to detect",
                points.len(),
                config.min_points
            );
            return DetectionResult {
                total_points: points.len() as u32,
                ..DetectionResult::default()
            };
        }

        smooth_elevation(&mut points, config.smoothing_window as usize);

        let stops = if streams.has_speed_source() {
            detect_stops(&points, config)
        } else {
            warn!("[SegmentDetector] No velocity or time stream; skipping stop detection");
            Vec::new()
        };

        let gradients = compute_gradients(&points, config);
        let boundaries = find_boundaries(&points, &gradients, &stops, config);
        let candidates = build_candidates(&points, &boundaries, config);
        let merged = merge_candidates(&candidates, config);

        let segments: Vec<DetectedSegment> = merged
            .iter()
            .filter(|c| c.end_idx > c.start_idx)
            .map(|c| characterize_segment(&points, c, &stops, config))
            .collect();

        let (total_elevation_gain, total_elevation_loss) =
            elevation_gain_loss(&points, config.elevation_noise_threshold);
        let first = &points[0];
        let last = &points[points.len() - 1];

        info!(
            "[SegmentDetector] {} points, {:.0}m, {} stops, {} boundaries, \
             {} candidates -> {} segments in {:?}",
            points.len(),
            last.distance,
            stops.len(),
            boundaries.len(),
            candidates.len(),
            segments.len(),
            started.elapsed()
        );

        DetectionResult {
            segments,
            stops,
            total_points: points.len() as u32,
            total_distance: last.distance - first.distance,
            total_duration: last.time - first.time,
            total_elevation_gain,
            total_elevation_loss,
        }
    }

    /// Detect over many independent rides, in input order.
    #[cfg(feature = "parallel")]
    pub fn detect_batch(&self, rides: &[ActivityStreams]) -> Vec<DetectionResult> {
        rides.par_iter().map(|ride| self.detect(ride)).collect()
    }

    /// Detect over many independent rides, in input order.
    #[cfg(not(feature = "parallel"))]
    pub fn detect_batch(&self, rides: &[ActivityStreams]) -> Vec<DetectionResult> {
        rides.iter().map(|ride| self.detect(ride)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characterize::TerrainType;
    use crate::error::SegmentError;
    use crate::GpsPoint;

    /// 1 Hz ride heading north. `speed(i)` is m/s for sample `i`, and
    /// `elevation(d)` is meters at cumulative distance `d`.
    fn ride(
        n: usize,
        speed: impl Fn(usize) -> f64,
        elevation: impl Fn(f64) -> f64,
    ) -> ActivityStreams {
        let mut latlng = Vec::with_capacity(n);
        let mut altitude = Vec::with_capacity(n);
        let mut velocity = Vec::with_capacity(n);
        let mut distance = 0.0;

        for i in 0..n {
            let v = speed(i);
            if i > 0 {
                distance += v;
            }
            latlng.push(GpsPoint::new(45.0 + distance / 111_195.0, 7.0));
            altitude.push(elevation(distance));
            velocity.push(v);
        }

        ActivityStreams::new(latlng)
            .with_altitude(altitude)
            .with_velocity(velocity)
            .with_time((0..n).map(|i| i as f64).collect())
    }

    fn detector() -> SegmentDetector {
        SegmentDetector::new(SegmentConfig::default()).unwrap()
    }

    #[test]
    fn test_flat_ride_gives_flat_segment() {
        // 250 samples at 10 m/s, ~2.5km
        let result = detector().detect(&ride(250, |_| 10.0, |_| 80.0));

        assert!(!result.segments.is_empty());
        let flat = result
            .segments
            .iter()
            .find(|s| s.terrain_type == TerrainType::Flat)
            .expect("a flat segment");
        assert!(flat.avg_gradient.abs() < 0.5);
        assert!(result.stops.is_empty());
        assert_eq!(result.total_points, 250);
        assert!(result.total_distance > 2000.0);
        assert_eq!(result.total_duration, 249.0);
    }

    #[test]
    fn test_steady_climb_gives_climb_segment() {
        let result = detector().detect(&ride(250, |_| 8.0, |d| 200.0 + d * 0.06));

        let climb = result
            .segments
            .iter()
            .find(|s| s.terrain_type == TerrainType::Climb)
            .expect("a climb segment");
        assert!(climb.avg_gradient > 2.0);
        assert!(climb.elevation_gain > 0.0);
        assert!(result.total_elevation_gain > 100.0);
        assert_eq!(result.total_elevation_loss, 0.0);
    }

    #[test]
    fn test_dwells_are_detected_as_stops() {
        let dwell = |i: usize| {
            (60..65).contains(&i) || (140..145).contains(&i) || (220..225).contains(&i)
        };
        let result = detector().detect(&ride(300, |i| if dwell(i) { 0.0 } else { 9.0 }, |_| 40.0));

        assert_eq!(result.stops.len(), 3);
        assert!(result.stops.iter().all(|s| s.duration_secs >= 3.0));
        let embedded: usize = result.segments.iter().map(|s| s.stops.len()).sum();
        assert!(embedded >= 1);
    }

    #[test]
    fn test_extended_stop_splits_ride() {
        // 200s riding, 150s stopped, 200s riding
        let stopped = |i: usize| (200..350).contains(&i);
        let speed = |i: usize| if stopped(i) { 0.0 } else { 10.0 };
        let result = detector().detect(&ride(550, speed, |_| 60.0));

        assert_eq!(result.stops.len(), 1);
        assert!(result.stops[0].duration_secs > 120.0);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].end_idx, result.stops[0].index);

        // The split stop is counted once, in the span the rider resumes in
        let embedded: Vec<usize> = result.segments.iter().map(|s| s.stops.len()).collect();
        assert_eq!(embedded, vec![0, 1]);
        assert_eq!(embedded.iter().sum::<usize>(), result.stops.len());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let streams = ride(
            400,
            |i| 7.0 + (i % 13) as f64 * 0.3,
            |d| 100.0 + (d / 300.0).sin() * 20.0,
        );
        let a = detector().detect(&streams);
        let b = detector().detect(&streams);
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_input_gives_empty_result() {
        let result = detector().detect(&ride(5, |_| 8.0, |_| 0.0));
        assert!(result.segments.is_empty());
        assert!(result.stops.is_empty());
        assert_eq!(result.total_points, 5);
        assert_eq!(result.total_distance, 0.0);

        let empty = detector().detect(&ActivityStreams::default());
        assert_eq!(empty, DetectionResult::default());
    }

    #[test]
    fn test_coordinates_only_skips_stops() {
        let coords: Vec<GpsPoint> = (0..150)
            .map(|i| GpsPoint::new(45.0 + i as f64 * 0.0001, 7.0))
            .collect();
        let result = detector().detect(&ActivityStreams::new(coords));

        assert!(result.stops.is_empty());
        assert_eq!(result.segments.len(), 1);
        // Elapsed time falls back to walking pace
        assert!(result.total_duration > 1000.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SegmentConfig {
            min_candidate_distance: 800.0,
            ..SegmentConfig::default()
        };
        assert!(matches!(
            SegmentDetector::new(config),
            Err(SegmentError::InvalidConfig { field: "min_candidate_distance", .. })
        ));
    }

    #[test]
    fn test_batch_matches_single_detection() {
        let rides = vec![
            ride(250, |_| 10.0, |_| 80.0),
            ride(250, |_| 8.0, |d| d * 0.05),
            ride(4, |_| 8.0, |_| 0.0),
        ];
        let detector = detector();
        let batch = detector.detect_batch(&rides);

        assert_eq!(batch.len(), 3);
        for (ride, result) in rides.iter().zip(&batch) {
            assert_eq!(&detector.detect(ride), result);
        }
    }
}
