//! Tunable thresholds for detection and matching.
//!
//! Every constant the pipeline uses lives here and is passed in explicitly, so
//! alternate tunings can be tested side by side without global state.

use crate::error::{Result, SegmentError};

/// Configuration for segment detection (stream building through characterization).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentConfig {
    /// Minimum number of usable points for detection to run.
    /// Default: 10
    pub min_points: u32,

    /// Centered moving-average window for elevation smoothing (points).
    /// Default: 5
    pub smoothing_window: u32,

    /// Speed assumed while stopped when estimating elapsed time (m/s).
    /// Default: 1.4
    pub walking_pace_mps: f64,

    /// Speeds at or below this are treated as stationary for time estimation (m/s).
    /// Default: 0.1
    pub moving_speed_epsilon: f64,

    /// Speed below which a rider is considered stopped (m/s).
    /// Default: 1.0
    pub stop_speed_threshold: f64,

    /// Minimum stopped duration for a stop to be recorded (seconds).
    /// Default: 3.0
    pub min_stop_duration_secs: f64,

    /// Stops longer than this always break a segment (seconds).
    /// Default: 120.0
    pub extended_stop_duration_secs: f64,

    /// Total distance window used for per-point gradients (meters, split evenly each side).
    /// Default: 100.0
    pub gradient_window_meters: f64,

    /// Gradient windows spanning less than this record a gradient of zero (meters).
    /// Default: 20.0
    pub min_gradient_span_meters: f64,

    /// Deviation from the rolling gradient that counts as a change (percent).
    /// Default: 3.0
    pub gradient_change_threshold: f64,

    /// Distance a gradient change must persist before a boundary is emitted (meters).
    /// Default: 200.0
    pub sustained_change_distance: f64,

    /// Weight kept by the rolling gradient on each blend (new sample gets the rest).
    ///
    /// The blend runs once per point, not per meter. On densely sampled climbs
    /// the rolling gradient can follow a gradual onset closely enough that no
    /// change is ever sustained; raise this toward 1.0 for high-rate streams.
    /// Default: 0.9
    pub boundary_rolling_decay: f64,

    /// Boundaries closer than this to an already kept boundary are dropped (meters).
    /// Default: 50.0
    pub boundary_dedup_distance: f64,

    /// Boundary spans shorter than this never become candidates (meters).
    /// Default: 200.0
    pub min_candidate_distance: f64,

    /// Minimum segment length after merging (meters).
    /// Default: 500.0
    pub min_segment_distance: f64,

    /// Elevation changes smaller than this accumulate before counting as gain/loss (meters).
    /// Default: 3.0
    pub elevation_noise_threshold: f64,

    /// Point-to-point steps shorter than this are ignored for edge gradients and bearings (meters).
    /// Default: 5.0
    pub min_gradient_edge_meters: f64,

    /// Absolute average gradient at or below which a steady segment is flat (percent).
    /// Default: 1.5
    pub flat_gradient_threshold: f64,

    /// Average gradient above which a segment is a climb (percent).
    /// Its negation is the descent threshold.
    /// Default: 3.0
    pub climb_gradient_threshold: f64,

    /// Elevation gain per kilometer above which a segment is a climb (m/km).
    /// Default: 30.0
    pub climb_elevation_per_km: f64,

    /// Gradient standard deviation below which a segment counts as steady.
    /// Default: 2.0
    pub low_variability: f64,

    /// Gradient standard deviation above which a non-climb segment is rolling.
    /// Default: 4.0
    pub high_variability: f64,

    /// Heading change that counts as a sharp turn (degrees).
    /// Default: 60.0
    pub sharp_turn_degrees: f64,

    /// Speed samples at or below this are excluded from averages (m/s).
    /// Default: 0.5
    pub min_valid_speed: f64,

    /// Power samples at or below this are excluded from averages (watts).
    /// Default: 0.0
    pub min_valid_power: f64,

    /// Heart-rate samples at or below this are excluded from averages (bpm).
    /// Default: 30.0
    pub min_valid_heart_rate: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_points: 10,
            smoothing_window: 5,
            walking_pace_mps: 1.4,
            moving_speed_epsilon: 0.1,
            stop_speed_threshold: 1.0,
            min_stop_duration_secs: 3.0,
            extended_stop_duration_secs: 120.0,
            gradient_window_meters: 100.0,
            min_gradient_span_meters: 20.0,
            gradient_change_threshold: 3.0,
            sustained_change_distance: 200.0,
            boundary_rolling_decay: 0.9,
            boundary_dedup_distance: 50.0,
            min_candidate_distance: 200.0,
            min_segment_distance: 500.0,
            elevation_noise_threshold: 3.0,
            min_gradient_edge_meters: 5.0,
            flat_gradient_threshold: 1.5,
            climb_gradient_threshold: 3.0,
            climb_elevation_per_km: 30.0,
            low_variability: 2.0,
            high_variability: 4.0,
            sharp_turn_degrees: 60.0,
            min_valid_speed: 0.5,
            min_valid_power: 0.0,
            min_valid_heart_rate: 30.0,
        }
    }
}

impl SegmentConfig {
    /// Check that every threshold is usable.
    ///
    /// The detector calls this once at construction; after that the pipeline
    /// assumes the values are sane.
    pub fn validate(&self) -> Result<()> {
        if self.smoothing_window == 0 {
            return Err(SegmentError::invalid("smoothing_window", "must be at least 1"));
        }
        if self.min_points < 2 {
            return Err(SegmentError::invalid("min_points", "must be at least 2"));
        }
        if self.walking_pace_mps <= 0.0 {
            return Err(SegmentError::invalid("walking_pace_mps", "must be positive"));
        }
        if self.extended_stop_duration_secs < self.min_stop_duration_secs {
            return Err(SegmentError::invalid(
                "extended_stop_duration_secs",
                "must not be shorter than min_stop_duration_secs",
            ));
        }
        if self.gradient_window_meters <= 0.0 {
            return Err(SegmentError::invalid("gradient_window_meters", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.boundary_rolling_decay) {
            return Err(SegmentError::invalid(
                "boundary_rolling_decay",
                format!("must be in [0, 1), got {}", self.boundary_rolling_decay),
            ));
        }
        if self.min_candidate_distance > self.min_segment_distance {
            return Err(SegmentError::invalid(
                "min_candidate_distance",
                "must not exceed min_segment_distance",
            ));
        }
        if self.low_variability > self.high_variability {
            return Err(SegmentError::invalid(
                "low_variability",
                "must not exceed high_variability",
            ));
        }
        if self.flat_gradient_threshold > self.climb_gradient_threshold {
            return Err(SegmentError::invalid(
                "flat_gradient_threshold",
                "must not exceed climb_gradient_threshold",
            ));
        }
        if !(0.0..=180.0).contains(&self.sharp_turn_degrees) {
            return Err(SegmentError::invalid("sharp_turn_degrees", "must be in [0, 180]"));
        }
        Ok(())
    }
}

/// Configuration for matching a detected segment against stored segments.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentMatchConfig {
    /// Shorter segment must be at least this fraction of the longer one.
    /// Default: 0.6
    pub min_distance_ratio: f64,

    /// Start and end points must both be within this distance (meters).
    /// Default: 200.0
    pub endpoint_threshold: f64,

    /// Along-path spacing used when resampling for overlap (meters).
    /// Default: 50.0
    pub sample_interval: f64,

    /// A sampled point is covered if a stored sample lies within this distance (meters).
    /// Default: 50.0
    pub proximity_threshold: f64,

    /// Minimum covered fraction for a match to be accepted.
    /// Exact matches land near 1.0; this is only the acceptance floor.
    /// Default: 0.6
    pub min_overlap_ratio: f64,
}

impl Default for SegmentMatchConfig {
    fn default() -> Self {
        Self {
            min_distance_ratio: 0.6,
            endpoint_threshold: 200.0,
            sample_interval: 50.0,
            proximity_threshold: 50.0,
            min_overlap_ratio: 0.6,
        }
    }
}

impl SegmentMatchConfig {
    /// Check that every threshold is usable.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_distance_ratio) {
            return Err(SegmentError::invalid("min_distance_ratio", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.min_overlap_ratio) {
            return Err(SegmentError::invalid("min_overlap_ratio", "must be in [0, 1]"));
        }
        if self.sample_interval <= 0.0 {
            return Err(SegmentError::invalid("sample_interval", "must be positive"));
        }
        if self.endpoint_threshold < 0.0 || self.proximity_threshold < 0.0 {
            return Err(SegmentError::invalid(
                "proximity_threshold",
                "distances must not be negative",
            ));
        }
        Ok(())
    }
}
