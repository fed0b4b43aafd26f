//! # Segment Characterization
//!
//! Turns a merged candidate span into a [`DetectedSegment`]: geometry,
//! gradient statistics, terrain type, effort aggregates, embedded stops,
//! sharp turns and a 0-100 quality score.
//!
//! Characterization is a pure function of the points, the candidate span,
//! the ride's stops and the config. Running it twice gives identical output.
//!
//! ## Terrain Decision Order
//!
//! 1. High gradient variability on a segment that is not climb-grade → `rolling`
//! 2. Average gradient or elevation gain per km above the climb thresholds → `climb`
//! 3. Average gradient at or below the negative climb threshold → `descent`
//! 4. Low gradient and low variability → `flat`
//! 5. Anything else → `rolling`

use crate::candidates::CandidateSegment;
use crate::config::SegmentConfig;
use crate::geo_utils::{bearing, bearing_change, compute_bounds};
use crate::stops::DetectedStop;
use crate::stream::{elevation_gain_loss, StreamPoint};
use crate::{Bounds, GpsPoint};

/// Rolling window for Normalized Power (samples).
const NP_WINDOW: usize = 30;
/// Below this many power samples, Normalized Power falls back to average power.
const NP_MIN_SAMPLES: usize = 10;

// Quality score penalties
const SHORT_DURATION_SECS: f64 = 120.0;
const SHORT_DISTANCE_PENALTY: f64 = 15.0;
const SHORT_DURATION_PENALTY: f64 = 15.0;
const VARIABILITY_PENALTY_PER_UNIT: f64 = 5.0;
const MAX_VARIABILITY_PENALTY: f64 = 20.0;
const STOP_DENSITY_FREE_PER_KM: f64 = 1.0;
const STOP_PENALTY_PER_KM: f64 = 10.0;
const MAX_STOP_PENALTY: f64 = 25.0;
const TURN_DENSITY_FREE_PER_KM: f64 = 3.0;
const TURN_PENALTY_PER_KM: f64 = 5.0;
const MAX_TURN_PENALTY: f64 = 20.0;

/// Training character of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TerrainType {
    Flat,
    Climb,
    Descent,
    Rolling,
}

impl TerrainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerrainType::Flat => "flat",
            TerrainType::Climb => "climb",
            TerrainType::Descent => "descent",
            TerrainType::Rolling => "rolling",
        }
    }
}

impl std::fmt::Display for TerrainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A characterized segment, the durable output of detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectedSegment {
    /// Index of the first point in the ride's stream
    pub start_idx: u32,
    /// Index of the last point in the ride's stream (inclusive)
    pub end_idx: u32,
    pub start_point: GpsPoint,
    pub end_point: GpsPoint,
    /// Full path, in direction of travel
    pub coordinates: Vec<GpsPoint>,
    /// Pre-computed bounding box for library prefiltering
    pub bounds: Bounds,
    /// Cumulative ride distance where the segment starts (meters)
    pub start_distance_meters: f64,
    /// Segment length (meters)
    pub distance_meters: f64,
    /// Mean of per-edge gradients (percent)
    pub avg_gradient: f64,
    pub max_gradient: f64,
    pub min_gradient: f64,
    /// Sample standard deviation of per-edge gradients
    pub gradient_variability: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub terrain_type: TerrainType,
    pub duration_secs: f64,
    /// Mean of valid speed samples (m/s), 0 when none
    pub avg_speed: f64,
    pub max_speed: f64,
    pub avg_power: Option<f64>,
    pub max_power: Option<f64>,
    pub normalized_power: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub avg_cadence: Option<f64>,
    /// Stops that fall inside the segment
    pub stops: Vec<DetectedStop>,
    pub sharp_turn_count: u32,
    /// 0-100, higher is better for structured training
    pub quality_score: f64,
}

/// Summary statistics of per-edge gradients.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GradientStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub variability: f64,
}

/// Characterize one merged candidate span.
pub fn characterize_segment(
    points: &[StreamPoint],
    candidate: &CandidateSegment,
    stops: &[DetectedStop],
    config: &SegmentConfig,
) -> DetectedSegment {
    let slice = &points[candidate.start_idx..=candidate.end_idx];
    let first = &slice[0];
    let last = &slice[slice.len() - 1];

    let coordinates: Vec<GpsPoint> = slice.iter().map(|p| p.point).collect();
    let distance = last.distance - first.distance;
    let duration = last.time - first.time;

    let (elevation_gain, elevation_loss) =
        elevation_gain_loss(slice, config.elevation_noise_threshold);
    let gradients = gradient_stats(slice, config.min_gradient_edge_meters);
    let elevation_per_km = if distance > 0.0 {
        elevation_gain / (distance / 1000.0)
    } else {
        0.0
    };
    let terrain_type = classify_terrain(&gradients, elevation_per_km, config);

    let speeds = valid_samples(slice, |p| p.speed, config.min_valid_speed);
    let powers = valid_samples(slice, |p| p.power, config.min_valid_power);
    let heart_rates = valid_samples(slice, |p| p.heart_rate, config.min_valid_heart_rate);
    let cadences = valid_samples(slice, |p| p.cadence, 0.0);

    // Spans share their edge index, so the range is half-open: a stop on the
    // edge belongs to the span it resumes in. The final span keeps its last point.
    let last_idx = points.len() - 1;
    let embedded_stops: Vec<DetectedStop> = stops
        .iter()
        .filter(|s| {
            let idx = s.index as usize;
            idx >= candidate.start_idx
                && (idx < candidate.end_idx || candidate.end_idx == last_idx)
        })
        .cloned()
        .collect();

    let sharp_turn_count = count_sharp_turns(
        &coordinates,
        config.sharp_turn_degrees,
        config.min_gradient_edge_meters,
    );

    let quality_score = quality_score(
        distance,
        duration,
        gradients.variability,
        embedded_stops.len(),
        sharp_turn_count,
        config,
    );

    DetectedSegment {
        start_idx: candidate.start_idx as u32,
        end_idx: candidate.end_idx as u32,
        start_point: first.point,
        end_point: last.point,
        bounds: compute_bounds(&coordinates),
        coordinates,
        start_distance_meters: first.distance,
        distance_meters: distance,
        avg_gradient: gradients.avg,
        max_gradient: gradients.max,
        min_gradient: gradients.min,
        gradient_variability: gradients.variability,
        elevation_gain,
        elevation_loss,
        terrain_type,
        duration_secs: duration,
        avg_speed: mean(&speeds).unwrap_or(0.0),
        max_speed: max(&speeds).unwrap_or(0.0),
        avg_power: mean(&powers),
        max_power: max(&powers),
        normalized_power: normalized_power(&powers),
        avg_heart_rate: mean(&heart_rates),
        max_heart_rate: max(&heart_rates),
        avg_cadence: mean(&cadences),
        stops: embedded_stops,
        sharp_turn_count,
        quality_score,
    }
}

/// Gradient statistics over edges longer than `min_edge` meters.
///
/// Returns all zeros when no edge qualifies.
pub fn gradient_stats(points: &[StreamPoint], min_edge: f64) -> GradientStats {
    let edges: Vec<f64> = points
        .windows(2)
        .filter_map(|w| {
            let step = w[1].distance - w[0].distance;
            (step > min_edge).then(|| (w[1].elevation - w[0].elevation) / step * 100.0)
        })
        .collect();

    let Some(avg) = mean(&edges) else {
        return GradientStats::default();
    };

    GradientStats {
        avg,
        max: max(&edges).unwrap_or(0.0),
        min: edges.iter().copied().fold(f64::INFINITY, f64::min),
        variability: sample_std_dev(&edges, avg),
    }
}

/// Apply the terrain decision sequence.
pub fn classify_terrain(
    gradients: &GradientStats,
    elevation_per_km: f64,
    config: &SegmentConfig,
) -> TerrainType {
    let climb_grade = gradients.avg > config.climb_gradient_threshold
        || elevation_per_km > config.climb_elevation_per_km;

    if gradients.variability > config.high_variability && !climb_grade {
        TerrainType::Rolling
    } else if climb_grade {
        TerrainType::Climb
    } else if gradients.avg <= -config.climb_gradient_threshold {
        TerrainType::Descent
    } else if gradients.avg.abs() <= config.flat_gradient_threshold
        && gradients.variability < config.low_variability
    {
        TerrainType::Flat
    } else {
        TerrainType::Rolling
    }
}

/// Normalized Power over a series of valid power samples.
///
/// 30-sample rolling average (shorter if the series is shorter), then the 4th
/// root of the mean of 4th powers. Fewer than 10 samples falls back to the
/// plain average; an empty series has no power at all.
///
/// ```rust
/// use segment_engine::characterize::normalized_power;
///
/// assert_eq!(normalized_power(&[]), None);
/// assert_eq!(normalized_power(&[200.0, 300.0]), Some(250.0));
///
/// let steady = vec![250.0; 60];
/// assert!((normalized_power(&steady).unwrap() - 250.0).abs() < 1e-9);
/// ```
pub fn normalized_power(powers: &[f64]) -> Option<f64> {
    if powers.len() < NP_MIN_SAMPLES {
        return mean(powers);
    }

    let window = NP_WINDOW.min(powers.len());
    let rolling: Vec<f64> = powers
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect();

    let mean_fourth = rolling.iter().map(|p| p.powi(4)).sum::<f64>() / rolling.len() as f64;
    Some(mean_fourth.powf(0.25))
}

/// Count heading changes of at least `threshold_degrees` between consecutive
/// point pairs. Steps shorter than `min_step` meters carry no usable heading
/// and are skipped.
pub fn count_sharp_turns(coordinates: &[GpsPoint], threshold_degrees: f64, min_step: f64) -> u32 {
    let mut headings = Vec::with_capacity(coordinates.len());
    let mut anchor = match coordinates.first() {
        Some(p) => *p,
        None => return 0,
    };

    for p in &coordinates[1..] {
        if crate::geo_utils::haversine_distance(&anchor, p) > min_step {
            headings.push(bearing(&anchor, p));
            anchor = *p;
        }
    }

    headings
        .windows(2)
        .filter(|w| bearing_change(w[0], w[1]) >= threshold_degrees)
        .count() as u32
}

/// Start at 100 and subtract penalties for anything that makes the segment
/// less useful for structured efforts.
fn quality_score(
    distance: f64,
    duration: f64,
    variability: f64,
    stop_count: usize,
    sharp_turns: u32,
    config: &SegmentConfig,
) -> f64 {
    let km = (distance / 1000.0).max(0.001);
    let mut score = 100.0;

    if distance < config.min_segment_distance * 2.0 {
        score -= SHORT_DISTANCE_PENALTY;
    }
    if duration < SHORT_DURATION_SECS {
        score -= SHORT_DURATION_PENALTY;
    }
    if variability > config.high_variability {
        score -= ((variability - config.high_variability) * VARIABILITY_PENALTY_PER_UNIT)
            .min(MAX_VARIABILITY_PENALTY);
    }

    let stops_per_km = stop_count as f64 / km;
    if stops_per_km > STOP_DENSITY_FREE_PER_KM {
        score -= (stops_per_km * STOP_PENALTY_PER_KM).min(MAX_STOP_PENALTY);
    }

    let turns_per_km = sharp_turns as f64 / km;
    if turns_per_km > TURN_DENSITY_FREE_PER_KM {
        score -= ((turns_per_km - TURN_DENSITY_FREE_PER_KM) * TURN_PENALTY_PER_KM)
            .min(MAX_TURN_PENALTY);
    }

    score.clamp(0.0, 100.0)
}

fn valid_samples(
    points: &[StreamPoint],
    channel: impl Fn(&StreamPoint) -> f64,
    min: f64,
) -> Vec<f64> {
    points.iter().map(channel).filter(|v| *v > min).collect()
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub(crate) fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stops::StopClassification;

    /// Straight line north, 10m spacing, 1 sample per second at 10 m/s.
    fn trace(n: usize, elevation: impl Fn(f64) -> f64) -> Vec<StreamPoint> {
        (0..n)
            .map(|i| {
                let d = i as f64 * 10.0;
                StreamPoint {
                    point: GpsPoint::new(45.0 + d / 111_195.0, 7.0),
                    elevation: elevation(d),
                    speed: 10.0,
                    power: 220.0,
                    heart_rate: 140.0,
                    cadence: 90.0,
                    distance: d,
                    time: i as f64,
                }
            })
            .collect()
    }

    fn whole(points: &[StreamPoint]) -> CandidateSegment {
        CandidateSegment {
            start_idx: 0,
            end_idx: points.len() - 1,
            start_distance: 0.0,
            end_distance: points[points.len() - 1].distance,
        }
    }

    #[test]
    fn test_flat_segment() {
        let points = trace(201, |_| 50.0);
        let segment =
            characterize_segment(&points, &whole(&points), &[], &SegmentConfig::default());

        assert_eq!(segment.terrain_type, TerrainType::Flat);
        assert!(segment.avg_gradient.abs() < 1e-9);
        assert!((segment.distance_meters - 2000.0).abs() < 1e-6);
        assert_eq!(segment.elevation_gain, 0.0);
        assert_eq!(segment.coordinates.len(), 201);
        assert_eq!(segment.duration_secs, 200.0);
        assert_eq!(segment.quality_score, 100.0);
    }

    #[test]
    fn test_climb_segment() {
        let points = trace(101, |d| d * 0.06);
        let segment =
            characterize_segment(&points, &whole(&points), &[], &SegmentConfig::default());

        assert_eq!(segment.terrain_type, TerrainType::Climb);
        assert!((segment.avg_gradient - 6.0).abs() < 1e-6);
        // Thresholded accumulation may leave the last few meters uncommitted
        assert!(segment.elevation_gain > 55.0 && segment.elevation_gain <= 60.0 + 1e-6);
        assert_eq!(segment.elevation_loss, 0.0);
    }

    #[test]
    fn test_descent_segment() {
        let points = trace(101, |d| 200.0 - d * 0.05);
        let segment =
            characterize_segment(&points, &whole(&points), &[], &SegmentConfig::default());
        assert_eq!(segment.terrain_type, TerrainType::Descent);
        assert!(segment.elevation_loss > 45.0);
    }

    #[test]
    fn test_terrain_decision_order() {
        let config = SegmentConfig::default();
        let stats = |avg, variability| GradientStats { avg, max: 0.0, min: 0.0, variability };

        // Variable but not climb-grade
        assert_eq!(classify_terrain(&stats(1.0, 6.0), 10.0, &config), TerrainType::Rolling);
        // Variable climb stays a climb
        assert_eq!(classify_terrain(&stats(5.0, 6.0), 50.0, &config), TerrainType::Climb);
        // Steep gain per km alone is enough
        assert_eq!(classify_terrain(&stats(2.0, 1.0), 40.0, &config), TerrainType::Climb);
        assert_eq!(classify_terrain(&stats(-3.0, 1.0), 0.0, &config), TerrainType::Descent);
        assert_eq!(classify_terrain(&stats(0.5, 1.0), 5.0, &config), TerrainType::Flat);
        // Gentle but neither flat nor climb
        assert_eq!(classify_terrain(&stats(2.0, 1.0), 20.0, &config), TerrainType::Rolling);
    }

    #[test]
    fn test_aggregates_skip_idle_samples() {
        let mut points = trace(101, |_| 50.0);
        for p in points.iter_mut().step_by(2) {
            p.power = 0.0;
            p.heart_rate = 0.0;
            p.speed = 0.2;
        }
        let segment =
            characterize_segment(&points, &whole(&points), &[], &SegmentConfig::default());

        assert_eq!(segment.avg_power, Some(220.0));
        assert_eq!(segment.avg_heart_rate, Some(140.0));
        assert_eq!(segment.avg_speed, 10.0);
        assert_eq!(segment.avg_cadence, Some(90.0));
    }

    #[test]
    fn test_missing_channels_are_absent() {
        let mut points = trace(101, |_| 50.0);
        for p in &mut points {
            p.power = 0.0;
            p.heart_rate = 0.0;
            p.cadence = 0.0;
        }
        let segment =
            characterize_segment(&points, &whole(&points), &[], &SegmentConfig::default());
        assert_eq!(segment.avg_power, None);
        assert_eq!(segment.normalized_power, None);
        assert_eq!(segment.max_heart_rate, None);
        assert_eq!(segment.avg_cadence, None);
    }

    #[test]
    fn test_normalized_power_emphasises_surges() {
        let steady = vec![200.0; 120];
        let surging: Vec<f64> = (0..120)
            .map(|i| if (i / 30) % 2 == 0 { 100.0 } else { 300.0 })
            .collect();

        let np_steady = normalized_power(&steady).unwrap();
        let np_surging = normalized_power(&surging).unwrap();
        assert!((np_steady - 200.0).abs() < 1e-9);
        assert!(np_surging > 200.0);
    }

    #[test]
    fn test_normalized_power_short_window() {
        // 12 samples: window shrinks to the full series, a single average
        let powers: Vec<f64> = (0..12).map(|i| 100.0 + i as f64 * 10.0).collect();
        let np = normalized_power(&powers).unwrap();
        assert!((np - 155.0).abs() < 1e-9);
    }

    #[test]
    fn test_sharp_turns_on_square() {
        // Four legs of ~200m around a square
        let mut coords = Vec::new();
        let step = 0.0002;
        for i in 0..10 {
            coords.push(GpsPoint::new(45.0 + i as f64 * step, 7.0));
        }
        for i in 0..10 {
            coords.push(GpsPoint::new(45.0 + 10.0 * step, 7.0 + i as f64 * step));
        }
        for i in 0..10 {
            coords.push(GpsPoint::new(45.0 + (10 - i) as f64 * step, 7.0 + 10.0 * step));
        }
        assert_eq!(count_sharp_turns(&coords, 60.0, 5.0), 2);

        let straight: Vec<GpsPoint> = (0..20)
            .map(|i| GpsPoint::new(45.0 + i as f64 * step, 7.0))
            .collect();
        assert_eq!(count_sharp_turns(&straight, 60.0, 5.0), 0);
    }

    #[test]
    fn test_embedded_stops_and_quality_penalty() {
        let points = trace(101, |_| 50.0);
        let stop = |index: u32| DetectedStop {
            index,
            point: points[index as usize].point,
            distance_from_start: points[index as usize].distance,
            duration_secs: 30.0,
            classification: StopClassification::Unclassified,
        };
        let stops = vec![stop(10), stop(40), stop(70), stop(100)];
        let candidate = CandidateSegment {
            start_idx: 0,
            end_idx: 80,
            start_distance: 0.0,
            end_distance: 800.0,
        };

        let segment = characterize_segment(&points, &candidate, &stops, &SegmentConfig::default());
        assert_eq!(segment.stops.len(), 3);
        // Short (<1000m), short (<120s), 3.75 stops/km
        assert!((segment.quality_score - (100.0 - 15.0 - 15.0 - 25.0)).abs() < 1e-9);
    }

    #[test]
    fn test_edge_stop_belongs_to_one_span() {
        let points = trace(101, |_| 50.0);
        let stop = |index: u32| DetectedStop {
            index,
            point: points[index as usize].point,
            distance_from_start: points[index as usize].distance,
            duration_secs: 200.0,
            classification: StopClassification::Unclassified,
        };
        let stops = vec![stop(50), stop(100)];
        let span = |start_idx: usize, end_idx: usize| CandidateSegment {
            start_idx,
            end_idx,
            start_distance: points[start_idx].distance,
            end_distance: points[end_idx].distance,
        };
        let config = SegmentConfig::default();

        let before = characterize_segment(&points, &span(0, 50), &stops, &config);
        let after = characterize_segment(&points, &span(50, 100), &stops, &config);

        assert!(before.stops.is_empty());
        let indices: Vec<u32> = after.stops.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![50, 100]);
    }

    #[test]
    fn test_characterize_is_deterministic() {
        let points = trace(150, |d| 100.0 + (d / 80.0).sin() * 8.0);
        let config = SegmentConfig::default();
        let a = characterize_segment(&points, &whole(&points), &[], &config);
        let b = characterize_segment(&points, &whole(&points), &[], &config);
        assert_eq!(a, b);
    }
}
