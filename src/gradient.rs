//! # Gradients and Segment Boundaries
//!
//! Per-point gradients are taken over a symmetric *distance* window, so
//! irregular sampling (dense in climbs, sparse on fast descents) does not
//! change the effective smoothing.
//!
//! Boundaries come from two sources:
//! 1. Sustained gradient changes, tracked by [`BoundaryTracker`]. A deviation
//!    from the rolling gradient must persist for a minimum distance before it
//!    counts, so a single noisy spike never splits a segment.
//! 2. Extended stops, which break training continuity regardless of terrain.
//!
//! The combined list is sorted by distance and thinned so no two kept
//! boundaries sit closer than the dedup distance. When two collide, `start`
//! and `end` always survive and an extended stop displaces a gradient change.

use log::debug;

use crate::config::SegmentConfig;
use crate::stops::DetectedStop;
use crate::stream::StreamPoint;

/// Why a boundary was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BoundaryReason {
    Start,
    GradientChange,
    ExtendedStop,
    End,
}

impl BoundaryReason {
    /// Which reason survives when two boundaries collide.
    fn priority(self) -> u8 {
        match self {
            BoundaryReason::GradientChange => 1,
            BoundaryReason::ExtendedStop => 2,
            BoundaryReason::Start | BoundaryReason::End => 3,
        }
    }
}

/// A candidate segment edge.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundaryPoint {
    pub index: usize,
    /// Cumulative distance at `index` (meters)
    pub distance: f64,
    pub reason: BoundaryReason,
}

/// Compute a gradient (percent) for every point.
///
/// The window grows outward from each point until each side covers half of
/// `gradient_window_meters`, or the sequence ends. Windows spanning less than
/// `min_gradient_span_meters` are too sparse to trust and yield 0.
pub fn compute_gradients(points: &[StreamPoint], config: &SegmentConfig) -> Vec<f64> {
    let n = points.len();
    let half = config.gradient_window_meters / 2.0;
    let mut gradients = Vec::with_capacity(n);

    for i in 0..n {
        let here = points[i].distance;

        let mut lo = i;
        while lo > 0 && here - points[lo].distance < half {
            lo -= 1;
        }
        let mut hi = i;
        while hi + 1 < n && points[hi].distance - here < half {
            hi += 1;
        }

        let span = points[hi].distance - points[lo].distance;
        let gradient = if span < config.min_gradient_span_meters {
            0.0
        } else {
            (points[hi].elevation - points[lo].elevation) / span * 100.0
        };
        gradients.push(gradient);
    }

    gradients
}

/// One input to [`BoundaryTracker::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientSample {
    pub index: usize,
    /// Cumulative distance (meters)
    pub distance: f64,
    /// Distance from the previous point (meters)
    pub step_distance: f64,
    /// Local gradient (percent)
    pub gradient: f64,
}

/// Hysteresis state for gradient boundary detection.
///
/// Holds an exponentially blended rolling gradient and the distance over which
/// the current deviation from it has persisted.
#[derive(Debug, Clone)]
pub struct BoundaryTracker {
    rolling_gradient: Option<f64>,
    sustained_distance: f64,
    change_threshold: f64,
    min_sustained: f64,
    decay: f64,
}

impl BoundaryTracker {
    pub fn new(config: &SegmentConfig) -> Self {
        Self {
            rolling_gradient: None,
            sustained_distance: 0.0,
            change_threshold: config.gradient_change_threshold,
            min_sustained: config.sustained_change_distance,
            decay: config.boundary_rolling_decay,
        }
    }

    /// Current rolling gradient, if any sample has been seen.
    pub fn rolling_gradient(&self) -> Option<f64> {
        self.rolling_gradient
    }

    /// Feed one sample; returns a boundary once a change has been sustained.
    ///
    /// The boundary index is placed where the change began, back-computed from
    /// the sustained distance and the local step size. With irregular spacing
    /// the returned `distance` is only an estimate; [`find_boundaries`] replaces
    /// it with the cumulative distance at the chosen index.
    pub fn step(&mut self, sample: GradientSample) -> Option<BoundaryPoint> {
        let Some(rolling) = self.rolling_gradient else {
            self.rolling_gradient = Some(sample.gradient);
            return None;
        };

        if (sample.gradient - rolling).abs() > self.change_threshold {
            self.sustained_distance += sample.step_distance;

            if self.sustained_distance > self.min_sustained {
                let points_back = if sample.step_distance > 0.0 {
                    (self.sustained_distance / sample.step_distance).round() as usize
                } else {
                    0
                };
                let boundary = BoundaryPoint {
                    index: sample.index.saturating_sub(points_back),
                    distance: (sample.distance - self.sustained_distance).max(0.0),
                    reason: BoundaryReason::GradientChange,
                };

                self.rolling_gradient = Some(sample.gradient);
                self.sustained_distance = 0.0;
                return Some(boundary);
            }
        } else {
            self.rolling_gradient =
                Some(self.decay * rolling + (1.0 - self.decay) * sample.gradient);
            self.sustained_distance = 0.0;
        }

        None
    }
}

/// Find sorted, deduplicated segment boundaries for a trace.
///
/// Always includes a `start` boundary at index 0 and an `end` boundary at the
/// last index (unless the whole trace is shorter than the dedup distance).
pub fn find_boundaries(
    points: &[StreamPoint],
    gradients: &[f64],
    stops: &[DetectedStop],
    config: &SegmentConfig,
) -> Vec<BoundaryPoint> {
    if points.is_empty() {
        return vec![];
    }

    let last = points.len() - 1;
    let mut boundaries = vec![BoundaryPoint {
        index: 0,
        distance: 0.0,
        reason: BoundaryReason::Start,
    }];

    let mut tracker = BoundaryTracker::new(config);
    for (i, point) in points.iter().enumerate() {
        let sample = GradientSample {
            index: i,
            distance: point.distance,
            step_distance: if i == 0 { 0.0 } else { point.distance - points[i - 1].distance },
            gradient: gradients.get(i).copied().unwrap_or(0.0),
        };
        if let Some(estimate) = tracker.step(sample) {
            let boundary = BoundaryPoint {
                distance: points[estimate.index].distance,
                ..estimate
            };
            debug!(
                "[Boundaries] gradient change at idx {} ({:.0}m)",
                boundary.index, boundary.distance
            );
            boundaries.push(boundary);
        }
    }

    boundaries.extend(
        stops
            .iter()
            .filter(|s| s.duration_secs > config.extended_stop_duration_secs)
            .map(|s| {
                let index = (s.index as usize).min(last);
                BoundaryPoint {
                    index,
                    distance: points[index].distance,
                    reason: BoundaryReason::ExtendedStop,
                }
            }),
    );

    boundaries.push(BoundaryPoint {
        index: last,
        distance: points[last].distance,
        reason: BoundaryReason::End,
    });

    dedup_boundaries(boundaries, config.boundary_dedup_distance)
}

/// Sort by distance and drop boundaries that crowd an already kept one.
fn dedup_boundaries(mut boundaries: Vec<BoundaryPoint>, min_gap: f64) -> Vec<BoundaryPoint> {
    boundaries.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.index.cmp(&b.index))
    });

    let mut kept: Vec<BoundaryPoint> = Vec::with_capacity(boundaries.len());
    for boundary in boundaries {
        match kept.last_mut() {
            Some(prev) if boundary.distance - prev.distance < min_gap => {
                if prev.reason != BoundaryReason::Start
                    && boundary.reason.priority() > prev.reason.priority()
                {
                    *prev = boundary;
                }
            }
            _ => kept.push(boundary),
        }
    }

    kept
}
