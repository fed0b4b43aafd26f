//! # Geographic Utilities
//!
//! Core geographic computation utilities for ride telemetry.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`polyline_length`] | Total length of a GPS track in meters |
//! | [`bearing`] | Initial heading from one point to another |
//! | [`bearing_change`] | Smallest absolute angle between two headings |
//! | [`resample_at_interval`] | Points spaced at a fixed distance along a path |
//! | [`compute_bounds`] | Bounding box of a GPS track |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//!
//! ## Example
//!
//! ```rust
//! use segment_engine::{GpsPoint, geo_utils};
//!
//! let track = vec![
//!     GpsPoint::new(51.5074, -0.1278),
//!     GpsPoint::new(51.5080, -0.1290),
//!     GpsPoint::new(51.5090, -0.1300),
//! ];
//!
//! let length = geo_utils::polyline_length(&track);
//! let samples = geo_utils::resample_at_interval(&track, 25.0);
//! assert!(samples.len() > track.len());
//! assert!(length > 100.0);
//! ```
//!
//! ## Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees).

use geo::{Bearing, Distance, Haversine, Point};
use crate::{Bounds, GpsPoint};

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface.
///
/// # Example
///
/// ```rust
/// use segment_engine::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    Haversine::distance(p1.to_point(), p2.to_point())
}

/// Calculate the total length of a polyline in meters.
///
/// Empty or single-point tracks return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Uses the longitude scale at that latitude, which is the larger of the two
/// degree spans, so the result is safe for square search boxes.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Heading Functions
// =============================================================================

/// Initial great-circle heading from `from` to `to`, in degrees clockwise from north.
#[inline]
pub fn bearing(from: &GpsPoint, to: &GpsPoint) -> f64 {
    Haversine::bearing(from.to_point(), to.to_point())
}

/// Smallest absolute difference between two headings, in `[0, 180]` degrees.
///
/// ```rust
/// use segment_engine::geo_utils::bearing_change;
///
/// assert_eq!(bearing_change(350.0, 10.0), 20.0);
/// assert_eq!(bearing_change(90.0, 270.0), 180.0);
/// ```
pub fn bearing_change(a: f64, b: f64) -> f64 {
    let diff = (b - a).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

// =============================================================================
// Resampling
// =============================================================================

/// Resample a path to points spaced `interval` meters apart along its length.
///
/// The first and last input points are always included, so a path shorter
/// than `interval` yields just its endpoints. Points between samples are
/// linearly interpolated, which is accurate at the short spacings used for
/// overlap checks.
pub fn resample_at_interval(points: &[GpsPoint], interval: f64) -> Vec<GpsPoint> {
    if points.len() < 2 || interval <= 0.0 {
        return points.to_vec();
    }

    let mut resampled = vec![points[0]];
    let mut accumulated = 0.0;
    let mut next_threshold = interval;

    for w in points.windows(2) {
        let (prev, curr) = (&w[0], &w[1]);
        let seg_dist = haversine_distance(prev, curr);

        while seg_dist > 0.0 && accumulated + seg_dist >= next_threshold {
            let ratio = (next_threshold - accumulated) / seg_dist;
            resampled.push(GpsPoint::new(
                prev.latitude + ratio * (curr.latitude - prev.latitude),
                prev.longitude + ratio * (curr.longitude - prev.longitude),
            ));
            next_threshold += interval;
        }

        accumulated += seg_dist;
    }

    let last = points[points.len() - 1];
    if resampled.last() != Some(&last) {
        resampled.push(last);
    }

    resampled
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a GPS track.
///
/// For empty input, returns bounds with MIN/MAX values that fail any overlap check.
///
/// ```rust
/// use segment_engine::{GpsPoint, geo_utils};
///
/// let track = vec![
///     GpsPoint::new(51.5000, -0.1300),
///     GpsPoint::new(51.5100, -0.1200),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&track);
/// assert_eq!(bounds.min_lat, 51.5000);
/// assert_eq!(bounds.max_lng, -0.1200);
/// ```
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

impl GpsPoint {
    /// Convert to a `geo` point (x = longitude, y = latitude).
    #[inline]
    pub(crate) fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
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
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        let a = GpsPoint::new(45.0, 7.0);
        let b = GpsPoint::new(46.0, 7.0);
        assert!(approx_eq(haversine_distance(&a, &b), 111_195.0, 200.0));
    }

    #[test]
    fn test_polyline_length_short_inputs() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[GpsPoint::new(51.5, -0.1)]), 0.0);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = GpsPoint::new(45.0, 7.0);
        let north = GpsPoint::new(45.01, 7.0);
        let east = GpsPoint::new(45.0, 7.01);
        let north_bearing = bearing(&origin, &north);
        assert!(approx_eq(north_bearing, 0.0, 0.5) || approx_eq(north_bearing, 360.0, 0.5));
        assert!(approx_eq(bearing(&origin, &east), 90.0, 0.5));
    }

    #[test]
    fn test_bearing_change_wraps() {
        assert!(approx_eq(bearing_change(10.0, 350.0), 20.0, 1e-9));
        assert!(approx_eq(bearing_change(0.0, 90.0), 90.0, 1e-9));
        assert!(approx_eq(bearing_change(270.0, 90.0), 180.0, 1e-9));
    }

    #[test]
    fn test_resample_spacing() {
        // ~1.1km straight line north
        let track = vec![GpsPoint::new(45.0, 7.0), GpsPoint::new(45.01, 7.0)];
        let samples = resample_at_interval(&track, 50.0);

        // 1112m / 50m = 22 interior samples + start + end
        assert!(samples.len() >= 23 && samples.len() <= 25);
        assert_eq!(samples[0], track[0]);
        assert_eq!(*samples.last().unwrap(), track[1]);
        let step = haversine_distance(&samples[1], &samples[2]);
        assert!(approx_eq(step, 50.0, 1.0));
    }

    #[test]
    fn test_resample_shorter_than_interval() {
        let track = vec![GpsPoint::new(45.0, 7.0), GpsPoint::new(45.0001, 7.0)];
        let samples = resample_at_interval(&track, 50.0);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_meters_to_degrees() {
        let deg = meters_to_degrees(111_320.0, 0.0);
        assert!(approx_eq(deg, 1.0, 0.01));
        assert!(meters_to_degrees(111_320.0, 45.0) > 1.0);
    }
}
