//! # Derived Classifiers
//!
//! Stateless scoring functions over characterized segments. None of them
//! depend on each other, and anything that needs outside context (FTP, max
//! heart rate, ride history) takes it as a plain parameter.
//!
//! | Function | Output |
//! |----------|--------|
//! | [`analyze_obstruction`] | weighted obstruction score + suitability flags |
//! | [`classify_topology`] | loop / out-and-back / point-to-point |
//! | [`classify_power_zone`], [`classify_hr_zone`] | seven-band training zone |
//! | [`calculate_consistency_score`] | 0-100 from coefficient of variation |
//! | [`calculate_confidence_score`] | 0-100 from ride history |
//! | [`calculate_relevance_score`], [`classify_frequency_tier`] | rider-specific importance |

use crate::characterize::{mean, sample_std_dev, DetectedSegment, TerrainType};
use crate::geo_utils::haversine_distance;
use crate::GpsPoint;

const SECONDS_PER_DAY: f64 = 86_400.0;

// ============================================================================
// Obstruction
// ============================================================================

const STOP_WEIGHT: f64 = 0.40;
const TURN_WEIGHT: f64 = 0.25;
const CONSISTENCY_WEIGHT: f64 = 0.35;

/// Sub-score points lost per stop per km.
const STOP_PENALTY_PER_KM: f64 = 30.0;
/// Sub-score points lost per sharp turn per km.
const TURN_PENALTY_PER_KM: f64 = 10.0;
/// Sub-score points lost per unit of gradient standard deviation.
const VARIABILITY_PENALTY: f64 = 12.0;

/// How well a segment supports uninterrupted efforts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObstructionAnalysis {
    /// Weighted blend of the sub-scores (0-100, higher is less obstructed)
    pub score: f64,
    pub stop_score: f64,
    pub turn_score: f64,
    pub consistency_score: f64,
    /// Longest stretch between stops (seconds)
    pub longest_uninterrupted_secs: f64,
    pub suitable_for_steady_state: bool,
    pub suitable_for_intervals: bool,
    pub suitable_for_sprints: bool,
    pub suitable_for_recovery: bool,
}

/// Score stop frequency, turn sharpness and gradient consistency, then derive
/// which kinds of efforts the segment supports.
pub fn analyze_obstruction(segment: &DetectedSegment) -> ObstructionAnalysis {
    let km = (segment.distance_meters / 1000.0).max(0.001);

    let stops_per_km = segment.stops.len() as f64 / km;
    let turns_per_km = segment.sharp_turn_count as f64 / km;

    let stop_score = (100.0 - stops_per_km * STOP_PENALTY_PER_KM).clamp(0.0, 100.0);
    let turn_score = (100.0 - turns_per_km * TURN_PENALTY_PER_KM).clamp(0.0, 100.0);
    let consistency_score =
        (100.0 - segment.gradient_variability * VARIABILITY_PENALTY).clamp(0.0, 100.0);

    let score = stop_score * STOP_WEIGHT
        + turn_score * TURN_WEIGHT
        + consistency_score * CONSISTENCY_WEIGHT;

    let longest = longest_uninterrupted_secs(segment);

    ObstructionAnalysis {
        score,
        stop_score,
        turn_score,
        consistency_score,
        longest_uninterrupted_secs: longest,
        suitable_for_steady_state: score >= 75.0 && longest >= 300.0,
        suitable_for_intervals: score >= 60.0 && longest >= 60.0,
        suitable_for_sprints: score >= 50.0 && longest >= 15.0,
        suitable_for_recovery: matches!(
            segment.terrain_type,
            TerrainType::Flat | TerrainType::Descent
        ),
    }
}

/// Longest gap between embedded stops.
///
/// Stop positions are mapped onto the segment's timeline by distance fraction.
fn longest_uninterrupted_secs(segment: &DetectedSegment) -> f64 {
    let duration = segment.duration_secs.max(0.0);
    if segment.stops.is_empty() || segment.distance_meters <= 0.0 {
        return duration;
    }

    let mut offsets: Vec<(f64, f64)> = segment
        .stops
        .iter()
        .map(|s| {
            let fraction = ((s.distance_from_start - segment.start_distance_meters)
                / segment.distance_meters)
                .clamp(0.0, 1.0);
            (fraction * duration, s.duration_secs)
        })
        .collect();
    offsets.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut cursor = 0.0;
    let mut longest: f64 = 0.0;
    for (at, stopped) in offsets {
        longest = longest.max(at - cursor);
        cursor = (at + stopped).min(duration).max(cursor);
    }
    longest.max(duration - cursor)
}

// ============================================================================
// Topology
// ============================================================================

const LOOP_CLOSURE_METERS: f64 = 200.0;
const OUT_AND_BACK_MAX_GAP_METERS: f64 = 500.0;
const OUT_AND_BACK_REACH_FACTOR: f64 = 1.5;

/// Start/end geometric relationship of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Topology {
    Loop,
    OutAndBack,
    PointToPoint,
}

/// Classify a path by its start, end and midpoint.
pub fn classify_topology(coordinates: &[GpsPoint]) -> Topology {
    let (Some(start), Some(end)) = (coordinates.first(), coordinates.last()) else {
        return Topology::PointToPoint;
    };

    let start_end = haversine_distance(start, end);
    if start_end < LOOP_CLOSURE_METERS {
        return Topology::Loop;
    }

    let mid = &coordinates[coordinates.len() / 2];
    let reach = start_end * OUT_AND_BACK_REACH_FACTOR;
    if start_end < OUT_AND_BACK_MAX_GAP_METERS
        && haversine_distance(mid, start) > reach
        && haversine_distance(mid, end) > reach
    {
        return Topology::OutAndBack;
    }

    Topology::PointToPoint
}

// ============================================================================
// Training Zones
// ============================================================================

/// Seven ordered intensity bands, plus `Unknown` when no reference exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TrainingZone {
    Recovery,
    Endurance,
    Tempo,
    SweetSpot,
    Threshold,
    Vo2max,
    Anaerobic,
    Unknown,
}

impl TrainingZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingZone::Recovery => "recovery",
            TrainingZone::Endurance => "endurance",
            TrainingZone::Tempo => "tempo",
            TrainingZone::SweetSpot => "sweet_spot",
            TrainingZone::Threshold => "threshold",
            TrainingZone::Vo2max => "vo2max",
            TrainingZone::Anaerobic => "anaerobic",
            TrainingZone::Unknown => "unknown",
        }
    }
}

/// Upper bound (exclusive) of each band as a fraction of FTP.
const POWER_ZONE_CUTS: [f64; 6] = [0.55, 0.75, 0.88, 0.95, 1.05, 1.20];
/// Upper bound (exclusive) of each band as a fraction of max heart rate.
const HR_ZONE_CUTS: [f64; 6] = [0.60, 0.70, 0.80, 0.85, 0.90, 0.95];

const ZONE_ORDER: [TrainingZone; 7] = [
    TrainingZone::Recovery,
    TrainingZone::Endurance,
    TrainingZone::Tempo,
    TrainingZone::SweetSpot,
    TrainingZone::Threshold,
    TrainingZone::Vo2max,
    TrainingZone::Anaerobic,
];

fn zone_for_ratio(ratio: f64, cuts: &[f64; 6]) -> TrainingZone {
    let band = cuts.iter().position(|cut| ratio < *cut).unwrap_or(cuts.len());
    ZONE_ORDER[band]
}

/// Map average power to a zone relative to FTP.
///
/// ```rust
/// use segment_engine::classify::{classify_power_zone, TrainingZone};
///
/// assert_eq!(classify_power_zone(230.0, 250.0), TrainingZone::SweetSpot);
/// assert_eq!(classify_power_zone(230.0, 0.0), TrainingZone::Unknown);
/// ```
pub fn classify_power_zone(avg_power: f64, ftp: f64) -> TrainingZone {
    if ftp <= 0.0 {
        return TrainingZone::Unknown;
    }
    zone_for_ratio(avg_power / ftp, &POWER_ZONE_CUTS)
}

/// Map average heart rate to a zone relative to max heart rate.
pub fn classify_hr_zone(avg_heart_rate: f64, max_heart_rate: f64) -> TrainingZone {
    if max_heart_rate <= 0.0 {
        return TrainingZone::Unknown;
    }
    zone_for_ratio(avg_heart_rate / max_heart_rate, &HR_ZONE_CUTS)
}

// ============================================================================
// Effort Scores
// ============================================================================

/// `100 - CV * 200`, clamped to [0, 100].
///
/// Needs at least two samples and a positive mean, otherwise 0.
pub fn calculate_consistency_score(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let Some(avg) = mean(samples) else {
        return 0.0;
    };
    if avg <= 0.0 {
        return 0.0;
    }

    let cv = sample_std_dev(samples, avg) / avg;
    (100.0 - cv * 200.0).clamp(0.0, 100.0)
}

const RECENT_RIDE_DAYS: f64 = 14.0;
const RECENT_RIDE_BONUS: f64 = 5.0;
const STALE_AFTER_DAYS: f64 = 90.0;
/// Staleness costs one point per this many days past `STALE_AFTER_DAYS`.
const STALE_DAYS_PER_POINT: f64 = 6.0;
const MAX_STALE_PENALTY: f64 = 30.0;
const REFERENCE_CHANGED_PENALTY: f64 = 15.0;

/// How much a stored segment's history can be trusted.
///
/// Timestamps are Unix seconds. `reference_changed` flags a significant FTP
/// (or similar) change since the history was recorded.
pub fn calculate_confidence_score(
    ride_count: u32,
    last_ridden_at: Option<i64>,
    now: i64,
    reference_changed: bool,
) -> f64 {
    let mut score: f64 = match ride_count {
        15.. => 95.0,
        10..=14 => 85.0,
        5..=9 => 70.0,
        3..=4 => 50.0,
        2 => 35.0,
        1 => 20.0,
        0 => 0.0,
    };

    if let Some(days) = last_ridden_at.map(|t| days_between(t, now)) {
        if days <= RECENT_RIDE_DAYS {
            score += RECENT_RIDE_BONUS;
        } else if days > STALE_AFTER_DAYS {
            score -= ((days - STALE_AFTER_DAYS) / STALE_DAYS_PER_POINT).min(MAX_STALE_PENALTY);
        }
    }

    if reference_changed {
        score -= REFERENCE_CHANGED_PENALTY;
    }

    score.clamp(0.0, 100.0)
}

const RELEVANCE_RIDE_CAP: f64 = 10.0;
const RELEVANCE_RECENCY_DAYS: f64 = 180.0;
const RELEVANCE_FREQUENCY_CAP: f64 = 4.0;

/// Blend of ride count (40), recency (30) and frequency (30).
pub fn calculate_relevance_score(
    ride_count: u32,
    last_ridden_at: Option<i64>,
    now: i64,
    rides_per_month: f64,
) -> f64 {
    let base = (ride_count as f64).min(RELEVANCE_RIDE_CAP) / RELEVANCE_RIDE_CAP * 40.0;

    let recency = last_ridden_at
        .map(|t| (1.0 - days_between(t, now) / RELEVANCE_RECENCY_DAYS).clamp(0.0, 1.0))
        .unwrap_or(0.0);

    let frequency =
        rides_per_month.clamp(0.0, RELEVANCE_FREQUENCY_CAP) / RELEVANCE_FREQUENCY_CAP * 30.0;

    (base + recency * 30.0 + frequency).clamp(0.0, 100.0)
}

/// How often a rider uses a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FrequencyTier {
    Primary,
    Regular,
    Occasional,
    Rare,
}

pub fn classify_frequency_tier(rides_per_month: f64) -> FrequencyTier {
    if rides_per_month >= 4.0 {
        FrequencyTier::Primary
    } else if rides_per_month >= 2.0 {
        FrequencyTier::Regular
    } else if rides_per_month >= 0.5 {
        FrequencyTier::Occasional
    } else {
        FrequencyTier::Rare
    }
}

fn days_between(earlier: i64, later: i64) -> f64 {
    (later - earlier).max(0) as f64 / SECONDS_PER_DAY
}
