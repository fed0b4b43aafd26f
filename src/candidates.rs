//! Candidate slicing and merging.
//!
//! Boundaries cut the trace into provisional candidates. Spans too short to
//! mean anything are dropped outright; the merger then folds undersized
//! candidates into a neighbour so emitted segments reach the minimum length.

use log::debug;

use crate::config::SegmentConfig;
use crate::gradient::BoundaryPoint;
use crate::stream::StreamPoint;

/// A provisional `[start_idx, end_idx]` span of the point sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateSegment {
    pub start_idx: usize,
    pub end_idx: usize,
    /// Cumulative distance at `start_idx` (meters)
    pub start_distance: f64,
    /// Cumulative distance at `end_idx` (meters)
    pub end_distance: f64,
}

impl CandidateSegment {
    pub fn distance(&self) -> f64 {
        self.end_distance - self.start_distance
    }

    /// Span from this candidate's start to `other`'s end.
    fn extend_to(&self, other: &CandidateSegment) -> CandidateSegment {
        CandidateSegment {
            start_idx: self.start_idx,
            end_idx: other.end_idx,
            start_distance: self.start_distance,
            end_distance: other.end_distance,
        }
    }
}

/// One candidate per consecutive boundary pair spanning at least
/// `min_candidate_distance`. Shorter spans are dropped, not merged.
pub fn build_candidates(
    points: &[StreamPoint],
    boundaries: &[BoundaryPoint],
    config: &SegmentConfig,
) -> Vec<CandidateSegment> {
    boundaries
        .windows(2)
        .filter_map(|w| {
            let (start_idx, end_idx) = (w[0].index, w[1].index);
            if end_idx <= start_idx || end_idx >= points.len() {
                return None;
            }
            let candidate = CandidateSegment {
                start_idx,
                end_idx,
                start_distance: points[start_idx].distance,
                end_distance: points[end_idx].distance,
            };
            (candidate.distance() >= config.min_candidate_distance).then_some(candidate)
        })
        .collect()
}

/// Fold undersized candidates into their neighbours, left to right.
///
/// - An undersized candidate with a successor is absorbed into that successor.
/// - A full-size candidate followed by an undersized one (that is not the last
///   candidate) absorbs it, and the walk skips past both.
/// - Anything else is committed as-is, so a trailing undersized remainder
///   with nothing left to merge into still comes through.
pub fn merge_candidates(
    candidates: &[CandidateSegment],
    config: &SegmentConfig,
) -> Vec<CandidateSegment> {
    let min = config.min_segment_distance;
    let mut pending = candidates.to_vec();
    let mut merged = Vec::with_capacity(pending.len());
    let mut i = 0;

    while i < pending.len() {
        let current = pending[i];
        let next = pending.get(i + 1).copied();

        if let Some(next) = next {
            if current.distance() < min {
                debug!(
                    "[Merge] idx {}..{} ({:.0}m) absorbed into next",
                    current.start_idx,
                    current.end_idx,
                    current.distance()
                );
                pending[i + 1] = current.extend_to(&next);
                i += 1;
                continue;
            }

            if next.distance() < min && i + 2 < pending.len() {
                debug!(
                    "[Merge] idx {}..{} ({:.0}m) absorbed into previous",
                    next.start_idx,
                    next.end_idx,
                    next.distance()
                );
                merged.push(current.extend_to(&next));
                i += 2;
                continue;
            }
        }

        merged.push(current);
        i += 1;
    }

    merged
}
