//! # Stream Building
//!
//! Turns parallel raw activity arrays into one ordered sequence of
//! [`StreamPoint`]s. Every optional channel is resolved here, once, through a
//! fallback chain, so later stages only ever see fully-populated records.
//!
//! Also hosts the two elevation passes that operate on the built stream:
//! centered smoothing and noise-thresholded gain/loss accumulation.

use crate::config::SegmentConfig;
use crate::error::{Result, SegmentError};
use crate::geo_utils::haversine_distance;
use crate::GpsPoint;

/// Raw activity streams as recorded by a device or returned by a provider.
///
/// Optional channels may be shorter than `latlng`; missing samples fall back
/// to defaults when the stream is built.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActivityStreams {
    pub latlng: Vec<GpsPoint>,
    /// Elevation in meters
    pub altitude: Option<Vec<f64>>,
    /// Instantaneous speed in m/s
    pub velocity: Option<Vec<f64>>,
    /// Power in watts
    pub watts: Option<Vec<f64>>,
    /// Heart rate in bpm
    pub heartrate: Option<Vec<f64>>,
    /// Cadence in rpm
    pub cadence: Option<Vec<f64>>,
    /// Elapsed seconds since the start of the recording
    pub time: Option<Vec<f64>>,
}

impl ActivityStreams {
    /// Create streams from coordinates only.
    pub fn new(latlng: Vec<GpsPoint>) -> Self {
        Self {
            latlng,
            ..Self::default()
        }
    }

    pub fn with_altitude(mut self, altitude: Vec<f64>) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_velocity(mut self, velocity: Vec<f64>) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_watts(mut self, watts: Vec<f64>) -> Self {
        self.watts = Some(watts);
        self
    }

    pub fn with_heartrate(mut self, heartrate: Vec<f64>) -> Self {
        self.heartrate = Some(heartrate);
        self
    }

    pub fn with_cadence(mut self, cadence: Vec<f64>) -> Self {
        self.cadence = Some(cadence);
        self
    }

    pub fn with_time(mut self, time: Vec<f64>) -> Self {
        self.time = Some(time);
        self
    }

    /// Strict check that no optional channel is longer than the coordinates.
    ///
    /// Building never requires this; shorter channels are padded with
    /// defaults and longer ones are truncated. Callers that want to reject
    /// misaligned uploads can validate first.
    pub fn validate(&self) -> Result<()> {
        let expected = self.latlng.len();
        let channels: [(&'static str, &Option<Vec<f64>>); 6] = [
            ("altitude", &self.altitude),
            ("velocity", &self.velocity),
            ("watts", &self.watts),
            ("heartrate", &self.heartrate),
            ("cadence", &self.cadence),
            ("time", &self.time),
        ];

        for (channel, values) in channels {
            if let Some(values) = values {
                if values.len() > expected {
                    return Err(SegmentError::MismatchedStreams {
                        channel,
                        expected,
                        actual: values.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Whether speed can be resolved at all (directly or from time).
    pub fn has_speed_source(&self) -> bool {
        self.velocity.is_some() || self.time.is_some()
    }
}

/// One resolved telemetry sample.
///
/// `distance` and `time` are cumulative from the start of the trace and never
/// decrease along the sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamPoint {
    pub point: GpsPoint,
    /// Meters
    pub elevation: f64,
    /// m/s
    pub speed: f64,
    /// Watts, 0 when absent
    pub power: f64,
    /// bpm, 0 when absent
    pub heart_rate: f64,
    /// rpm, 0 when absent
    pub cadence: f64,
    /// Cumulative distance from the first point (meters)
    pub distance: f64,
    /// Elapsed time (seconds)
    pub time: f64,
}

/// Sample `idx` of an optional channel, if present and finite.
#[inline]
fn channel_value(channel: &Option<Vec<f64>>, idx: usize) -> Option<f64> {
    channel
        .as_ref()
        .and_then(|values| values.get(idx))
        .copied()
        .filter(|v| v.is_finite())
}

/// Build the ordered point sequence from raw streams.
///
/// Fallback chains, applied per sample:
/// - elevation: altitude → previous elevation → 0
/// - speed: velocity → Δdistance/Δtime from the time channel → 0
/// - elapsed time: time channel → Δdistance/speed when moving, Δdistance/walking pace otherwise
/// - power, heart rate, cadence: channel → 0
///
/// Points with invalid coordinates are dropped together with their samples.
/// An empty coordinate stream yields an empty sequence.
pub fn build_stream(streams: &ActivityStreams, config: &SegmentConfig) -> Vec<StreamPoint> {
    let mut points: Vec<StreamPoint> = Vec::with_capacity(streams.latlng.len());

    for (idx, gps) in streams.latlng.iter().enumerate() {
        if !gps.is_valid() {
            continue;
        }

        let prev = points.last();
        let step = prev.map_or(0.0, |p| haversine_distance(&p.point, gps));
        let distance = prev.map_or(0.0, |p| p.distance) + step;
        let prev_time = prev.map_or(0.0, |p| p.time);

        let elevation = channel_value(&streams.altitude, idx)
            .or_else(|| prev.map(|p| p.elevation))
            .unwrap_or(0.0);

        let recorded_time = channel_value(&streams.time, idx).map(|t| t.max(prev_time));

        let speed = channel_value(&streams.velocity, idx)
            .filter(|v| *v >= 0.0)
            .or_else(|| {
                let t = recorded_time?;
                let dt = t - prev_time;
                (prev.is_some() && dt > 0.0).then(|| step / dt)
            })
            .unwrap_or(0.0);

        let time = match (prev, recorded_time) {
            (None, Some(t)) => t,
            (None, None) => 0.0,
            (Some(_), Some(t)) => t,
            (Some(_), None) => {
                let pace = if speed > config.moving_speed_epsilon {
                    speed
                } else {
                    config.walking_pace_mps
                };
                prev_time + step / pace
            }
        };

        points.push(StreamPoint {
            point: *gps,
            elevation,
            speed,
            power: channel_value(&streams.watts, idx).unwrap_or(0.0),
            heart_rate: channel_value(&streams.heartrate, idx).unwrap_or(0.0),
            cadence: channel_value(&streams.cadence, idx).unwrap_or(0.0),
            distance,
            time,
        });
    }

    points
}

/// Smooth elevation in place with a centered moving average.
///
/// Windows shrink at the edges rather than wrapping. Sequences shorter than
/// the window are left untouched.
pub fn smooth_elevation(points: &mut [StreamPoint], window: usize) {
    if window < 2 || points.len() < window {
        return;
    }

    let raw: Vec<f64> = points.iter().map(|p| p.elevation).collect();
    let half = window / 2;

    for (i, point) in points.iter_mut().enumerate() {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(raw.len() - 1);
        let slice = &raw[lo..=hi];
        point.elevation = slice.iter().sum::<f64>() / slice.len() as f64;
    }
}

/// Elevation gain and loss with small changes filtered as noise.
///
/// Point-to-point deltas accumulate into a pending sum that is only committed
/// to gain (or loss) once its magnitude reaches `threshold`. Returns
/// `(gain, loss)`, both non-negative.
pub fn elevation_gain_loss(points: &[StreamPoint], threshold: f64) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut pending = 0.0;

    for w in points.windows(2) {
        pending += w[1].elevation - w[0].elevation;

        if pending >= threshold {
            gain += pending;
            pending = 0.0;
        } else if pending <= -threshold {
            loss -= pending;
            pending = 0.0;
        }
    }

    (gain, loss)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<GpsPoint> {
        // ~11m spacing heading north
        (0..n).map(|i| GpsPoint::new(45.0 + i as f64 * 0.0001, 7.0)).collect()
    }

    fn flat_points(elevations: &[f64]) -> Vec<StreamPoint> {
        let streams = ActivityStreams::new(line(elevations.len()))
            .with_altitude(elevations.to_vec())
            .with_velocity(vec![8.0; elevations.len()]);
        build_stream(&streams, &SegmentConfig::default())
    }

    #[test]
    fn test_empty_coordinates() {
        let points = build_stream(&ActivityStreams::default(), &SegmentConfig::default());
        assert!(points.is_empty());
    }

    #[test]
    fn test_ragged_channels_default() {
        let streams = ActivityStreams::new(line(5))
            .with_altitude(vec![100.0, 101.0])
            .with_watts(vec![200.0, 210.0, 220.0]);
        let points = build_stream(&streams, &SegmentConfig::default());

        assert_eq!(points.len(), 5);
        // Elevation carries forward, power defaults to zero
        assert_eq!(points[4].elevation, 101.0);
        assert_eq!(points[2].power, 220.0);
        assert_eq!(points[3].power, 0.0);
        assert_eq!(points[0].heart_rate, 0.0);
    }

    #[test]
    fn test_distance_and_time_non_decreasing() {
        let streams = ActivityStreams::new(line(20))
            .with_velocity((0..20).map(|i| if i % 4 == 0 { 0.0 } else { 6.0 }).collect());
        let points = build_stream(&streams, &SegmentConfig::default());

        for w in points.windows(2) {
            assert!(w[1].distance >= w[0].distance);
            assert!(w[1].time >= w[0].time);
        }
        assert!(points[19].distance > 200.0);
    }

    #[test]
    fn test_stopped_time_uses_walking_pace() {
        let config = SegmentConfig::default();
        let streams = ActivityStreams::new(line(2)).with_velocity(vec![0.0, 0.0]);
        let points = build_stream(&streams, &config);

        let expected = points[1].distance / config.walking_pace_mps;
        assert!((points[1].time - expected).abs() < 1e-9);
    }

    #[test]
    fn test_time_channel_derives_speed() {
        let streams = ActivityStreams::new(line(3)).with_time(vec![0.0, 2.0, 4.0]);
        let points = build_stream(&streams, &SegmentConfig::default());

        assert_eq!(points[2].time, 4.0);
        let expected = (points[2].distance - points[1].distance) / 2.0;
        assert!((points[2].speed - expected).abs() < 1e-9);
        assert_eq!(points[0].speed, 0.0);
    }

    #[test]
    fn test_invalid_coordinates_dropped() {
        let mut coords = line(4);
        coords[1] = GpsPoint::new(f64::NAN, 7.0);
        let streams = ActivityStreams::new(coords).with_watts(vec![1.0, 2.0, 3.0, 4.0]);
        let points = build_stream(&streams, &SegmentConfig::default());

        assert_eq!(points.len(), 3);
        assert_eq!(points[1].power, 3.0);
    }

    #[test]
    fn test_validate_rejects_long_channel() {
        let streams = ActivityStreams::new(line(2)).with_cadence(vec![80.0; 3]);
        assert!(matches!(
            streams.validate(),
            Err(SegmentError::MismatchedStreams { channel: "cadence", .. })
        ));
        assert!(ActivityStreams::new(line(2)).with_cadence(vec![80.0]).validate().is_ok());
    }

    #[test]
    fn test_smoothing_flattens_spike() {
        let mut points = flat_points(&[100.0, 100.0, 100.0, 150.0, 100.0, 100.0, 100.0]);
        smooth_elevation(&mut points, 5);

        assert!((points[3].elevation - 110.0).abs() < 1e-9);
        // Edge window shrinks to 3 points
        assert!((points[0].elevation - 100.0).abs() < 1e-9);
        assert!((points[1].elevation - 112.5).abs() < 1e-9);
    }

    #[test]
    fn test_smoothing_short_sequence_noop() {
        let mut points = flat_points(&[100.0, 140.0, 100.0]);
        smooth_elevation(&mut points, 5);
        assert_eq!(points[1].elevation, 140.0);
    }

    #[test]
    fn test_gain_loss_ignores_jitter() {
        let jitter = flat_points(&[100.0, 101.0, 100.0, 101.5, 100.0, 101.0]);
        assert_eq!(elevation_gain_loss(&jitter, 3.0), (0.0, 0.0));

        let climb = flat_points(&[100.0, 102.0, 104.0, 106.0, 103.0, 99.0]);
        let (gain, loss) = elevation_gain_loss(&climb, 3.0);
        // +2 +2 commits 4, +2 -3 -4 leaves -5 committed as loss
        assert!((gain - 4.0).abs() < 1e-9);
        assert!((loss - 5.0).abs() < 1e-9);
    }
}
