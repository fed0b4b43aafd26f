//! Stop detection.
//!
//! A small two-state machine over the point sequence. Dips below the stop
//! speed that do not last long enough are treated as noise and dropped.

use crate::config::SegmentConfig;
use crate::stream::StreamPoint;
use crate::GpsPoint;

/// How a stop relates to other rides over the same road.
///
/// Detection only ever emits [`StopClassification::Unclassified`]; cross-ride
/// analysis outside this crate fills in the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StopClassification {
    #[default]
    Unclassified,
    /// Seen at the same place on most rides (lights, junctions)
    Recurring,
    /// Seen once or rarely
    Incidental,
}

/// A dwell event inside a ride.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectedStop {
    /// Index of the first stopped point in the stream
    pub index: u32,
    /// Where the stop happened
    pub point: GpsPoint,
    /// Cumulative distance from trace start (meters)
    pub distance_from_start: f64,
    /// Time spent stopped (seconds)
    pub duration_secs: f64,
    pub classification: StopClassification,
}

#[derive(Debug, Clone, Copy)]
enum StopState {
    Moving,
    Stopped { since: usize },
}

/// Find every interval where speed stays below the stop threshold for at
/// least the minimum stop duration.
///
/// A stop still open at the end of the sequence is closed at the last point.
pub fn detect_stops(points: &[StreamPoint], config: &SegmentConfig) -> Vec<DetectedStop> {
    let mut stops = Vec::new();
    let mut state = StopState::Moving;

    for (i, point) in points.iter().enumerate() {
        let stopped = point.speed < config.stop_speed_threshold;

        state = match (state, stopped) {
            (StopState::Moving, true) => StopState::Stopped { since: i },
            (StopState::Stopped { since }, false) => {
                if let Some(stop) = close_stop(points, since, i, config) {
                    stops.push(stop);
                }
                StopState::Moving
            }
            (current, _) => current,
        };
    }

    if let StopState::Stopped { since } = state {
        if let Some(stop) = close_stop(points, since, points.len() - 1, config) {
            stops.push(stop);
        }
    }

    stops
}

fn close_stop(
    points: &[StreamPoint],
    start: usize,
    end: usize,
    config: &SegmentConfig,
) -> Option<DetectedStop> {
    let duration = points[end].time - points[start].time;
    if duration < config.min_stop_duration_secs {
        return None;
    }

    let at = &points[start];
    Some(DetectedStop {
        index: start as u32,
        point: at.point,
        distance_from_start: at.distance,
        duration_secs: duration,
        classification: StopClassification::Unclassified,
    })
}
