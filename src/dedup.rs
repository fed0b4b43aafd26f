//! # Segment Deduplication
//!
//! Matches a freshly detected segment against segments already in a rider's
//! library so a recurring road is recognised instead of stored twice.
//!
//! Each stored candidate goes through three stages, cheapest first:
//!
//! 1. **Distance** - the shorter path must be at least `min_distance_ratio`
//!    of the longer one.
//! 2. **Endpoints** - start/end must both be within `endpoint_threshold`, in
//!    either the same or the reverse orientation.
//! 3. **Overlap** - both paths are resampled every `sample_interval` meters;
//!    a new-segment sample is covered if a stored sample lies within
//!    `proximity_threshold`. The covered fraction must reach
//!    `min_overlap_ratio`.
//!
//! Matching assumes a small candidate list. For a whole library, build a
//! [`SegmentLibraryIndex`] and let its R-tree do the geographic prefilter.

use log::debug;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::characterize::DetectedSegment;
use crate::config::SegmentMatchConfig;
use crate::geo_utils::{compute_bounds, haversine_distance, meters_to_degrees, resample_at_interval};
use crate::{Bounds, GpsPoint};

// ============================================================================
// Types
// ============================================================================

/// A segment as persisted in the library. Owned by the caller's storage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredSegment {
    pub id: String,
    pub start_point: GpsPoint,
    pub end_point: GpsPoint,
    pub distance_meters: f64,
    pub coordinates: Vec<GpsPoint>,
}

impl StoredSegment {
    /// Library entry for a newly detected segment.
    pub fn from_detected(id: impl Into<String>, segment: &DetectedSegment) -> Self {
        Self {
            id: id.into(),
            start_point: segment.start_point,
            end_point: segment.end_point,
            distance_meters: segment.distance_meters,
            coordinates: segment.coordinates.clone(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        compute_bounds(&self.coordinates)
    }
}

/// Orientation in which a stored segment was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchDirection {
    /// Ridden start to end, like the stored segment
    Same,
    /// Ridden end to start
    Reverse,
}

/// A stored segment that passed all three matching stages.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentMatch {
    pub segment_id: String,
    /// Fraction of the new segment's samples covered by the stored path (0-1)
    pub overlap_ratio: f64,
    /// Shorter length over longer length (0-1)
    pub distance_ratio: f64,
    /// Gap between the new start and the matching stored endpoint (meters)
    pub start_distance_meters: f64,
    /// Gap between the new end and the matching stored endpoint (meters)
    pub end_distance_meters: f64,
    pub direction: MatchDirection,
}

/// What the caller should do with a new segment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LibraryAction {
    /// Fold the ride into an existing stored segment
    Merge { segment_id: String, overlap_ratio: f64 },
    /// Store as a new segment
    Insert,
}

// ============================================================================
// Matching
// ============================================================================

/// Sampled path point for the overlap R-tree.
#[derive(Debug, Clone, Copy)]
struct IndexedSample {
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedSample {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedSample {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Match one segment against a caller-prefiltered list of stored segments.
///
/// Returns matches sorted best first: highest overlap, then closest length.
///
/// ```rust
/// use segment_engine::{find_matching_segments, GpsPoint, SegmentMatchConfig, StoredSegment};
/// # use segment_engine::{SegmentDetector, SegmentConfig, ActivityStreams};
/// # let coords: Vec<GpsPoint> =
/// #     (0..120).map(|i| GpsPoint::new(45.0 + i as f64 * 0.0001, 7.0)).collect();
/// # let streams = ActivityStreams::new(coords).with_velocity(vec![8.0; 120]);
/// # let detector = SegmentDetector::new(SegmentConfig::default()).unwrap();
/// # let segment = detector.detect(&streams).segments.remove(0);
/// let stored = StoredSegment::from_detected("seg-1", &segment);
/// let matches = find_matching_segments(&segment, &[stored], &SegmentMatchConfig::default());
///
/// assert_eq!(matches.len(), 1);
/// assert!(matches[0].overlap_ratio >= 0.8);
/// ```
pub fn find_matching_segments(
    segment: &DetectedSegment,
    candidates: &[StoredSegment],
    config: &SegmentMatchConfig,
) -> Vec<SegmentMatch> {
    let samples = resample_at_interval(&segment.coordinates, config.sample_interval);
    let mut matches: Vec<SegmentMatch> = candidates
        .iter()
        .filter_map(|stored| match_candidate(segment, &samples, stored, config))
        .collect();
    sort_matches(&mut matches);
    matches
}

fn match_candidate(
    segment: &DetectedSegment,
    samples: &[GpsPoint],
    stored: &StoredSegment,
    config: &SegmentMatchConfig,
) -> Option<SegmentMatch> {
    // Stage 1: comparable length
    let distance_ratio = length_ratio(segment.distance_meters, stored.distance_meters)?;
    if distance_ratio < config.min_distance_ratio {
        return None;
    }

    // Stage 2: endpoints, either orientation
    let (direction, start_gap, end_gap) =
        match_endpoints(segment, stored, config.endpoint_threshold)?;

    // Stage 3: sampled overlap
    let overlap_ratio = sampled_overlap(samples, stored, config);
    if overlap_ratio < config.min_overlap_ratio {
        debug!(
            "[Dedup] {} rejected: overlap {:.2} < {:.2}",
            stored.id, overlap_ratio, config.min_overlap_ratio
        );
        return None;
    }

    Some(SegmentMatch {
        segment_id: stored.id.clone(),
        overlap_ratio,
        distance_ratio,
        start_distance_meters: start_gap,
        end_distance_meters: end_gap,
        direction,
    })
}

fn length_ratio(a: f64, b: f64) -> Option<f64> {
    if a <= 0.0 || b <= 0.0 {
        return None;
    }
    Some(a.min(b) / a.max(b))
}

/// Both endpoints within `threshold` in the same or reverse orientation.
/// When both qualify (near-loops), the tighter fit wins.
fn match_endpoints(
    segment: &DetectedSegment,
    stored: &StoredSegment,
    threshold: f64,
) -> Option<(MatchDirection, f64, f64)> {
    let same = (
        haversine_distance(&segment.start_point, &stored.start_point),
        haversine_distance(&segment.end_point, &stored.end_point),
    );
    let reverse = (
        haversine_distance(&segment.start_point, &stored.end_point),
        haversine_distance(&segment.end_point, &stored.start_point),
    );

    let same_ok = same.0 <= threshold && same.1 <= threshold;
    let reverse_ok = reverse.0 <= threshold && reverse.1 <= threshold;

    match (same_ok, reverse_ok) {
        (true, true) if reverse.0 + reverse.1 < same.0 + same.1 => {
            Some((MatchDirection::Reverse, reverse.0, reverse.1))
        }
        (true, _) => Some((MatchDirection::Same, same.0, same.1)),
        (false, true) => Some((MatchDirection::Reverse, reverse.0, reverse.1)),
        (false, false) => None,
    }
}

/// Fraction of `samples` with a stored-path sample within the proximity threshold.
fn sampled_overlap(
    samples: &[GpsPoint],
    stored: &StoredSegment,
    config: &SegmentMatchConfig,
) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let stored_samples = resample_at_interval(&stored.coordinates, config.sample_interval);
    let tree = RTree::bulk_load(
        stored_samples
            .iter()
            .map(|p| IndexedSample { lat: p.latitude, lng: p.longitude })
            .collect(),
    );

    let covered = samples
        .iter()
        .filter(|p| {
            let radius = meters_to_degrees(config.proximity_threshold, p.latitude);
            tree.locate_within_distance([p.latitude, p.longitude], radius * radius)
                .any(|s| {
                    let gap = haversine_distance(p, &GpsPoint::new(s.lat, s.lng));
                    gap <= config.proximity_threshold
                })
        })
        .count();

    covered as f64 / samples.len() as f64
}

fn sort_matches(matches: &mut [SegmentMatch]) {
    matches.sort_by(|a, b| {
        b.overlap_ratio
            .total_cmp(&a.overlap_ratio)
            .then(b.distance_ratio.total_cmp(&a.distance_ratio))
    });
}

/// Merge into the best match if it covers at least `merge_threshold`,
/// otherwise insert. Expects `matches` sorted best first.
pub fn resolve_library_action(matches: &[SegmentMatch], merge_threshold: f64) -> LibraryAction {
    match matches.first() {
        Some(best) if best.overlap_ratio >= merge_threshold => LibraryAction::Merge {
            segment_id: best.segment_id.clone(),
            overlap_ratio: best.overlap_ratio,
        },
        _ => LibraryAction::Insert,
    }
}

// ============================================================================
// Library Index
// ============================================================================

/// Bounding box of a stored segment, keyed by its slot in the library.
#[derive(Debug, Clone)]
struct SegmentBounds {
    slot: usize,
    bounds: Bounds,
}

impl RTreeObject for SegmentBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// Stored segments plus an R-tree over their bounding boxes.
///
/// Read-only matching is safe to share across threads. Inserting is the
/// caller's to serialize.
pub struct SegmentLibraryIndex {
    segments: Vec<StoredSegment>,
    tree: RTree<SegmentBounds>,
}

impl SegmentLibraryIndex {
    pub fn new(segments: Vec<StoredSegment>) -> Self {
        let entries = segments
            .iter()
            .enumerate()
            .map(|(slot, s)| SegmentBounds { slot, bounds: s.bounds() })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            segments,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[StoredSegment] {
        &self.segments
    }

    /// Add a segment to the library.
    pub fn insert(&mut self, segment: StoredSegment) {
        let slot = self.segments.len();
        self.tree.insert(SegmentBounds { slot, bounds: segment.bounds() });
        self.segments.push(segment);
    }

    /// Stored segments whose bounding box comes within `buffer_meters` of
    /// the segment's bounding box.
    pub fn candidates_for(
        &self,
        segment: &DetectedSegment,
        buffer_meters: f64,
    ) -> Vec<&StoredSegment> {
        let b = &segment.bounds;
        let buffer = meters_to_degrees(buffer_meters, b.center().latitude);
        let search = AABB::from_corners(
            [b.min_lng - buffer, b.min_lat - buffer],
            [b.max_lng + buffer, b.max_lat + buffer],
        );

        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&search)
            .map(|e| e.slot)
            .collect();
        slots.sort_unstable();
        slots.into_iter().map(|slot| &self.segments[slot]).collect()
    }

    /// Prefilter by bounding box, then run the three-stage matcher.
    pub fn find_matches(
        &self,
        segment: &DetectedSegment,
        config: &SegmentMatchConfig,
    ) -> Vec<SegmentMatch> {
        let candidates = self.candidates_for(segment, config.endpoint_threshold);
        let samples = resample_at_interval(&segment.coordinates, config.sample_interval);

        #[cfg(feature = "parallel")]
        let mut matches: Vec<SegmentMatch> = candidates
            .par_iter()
            .filter_map(|stored| match_candidate(segment, &samples, stored, config))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let mut matches: Vec<SegmentMatch> = candidates
            .iter()
            .filter_map(|stored| match_candidate(segment, &samples, stored, config))
            .collect();

        debug!(
            "[Dedup] {} of {} library segments prefiltered, {} matched",
            candidates.len(),
            self.segments.len(),
            matches.len()
        );

        sort_matches(&mut matches);
        matches
    }
}
