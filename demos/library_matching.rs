//! Example of building a segment library across several rides of the same road.
//!
//! Run with: cargo run --example library_matching --features parallel

use segment_engine::{
    resolve_library_action, ActivityStreams, GpsPoint, LibraryAction, SegmentDetector,
    SegmentLibraryIndex, SegmentMatchConfig, StoredSegment,
};
use std::time::Instant;

fn main() {
    println!("Segment Library Example\n");

    // Same 3km road ridden five times with small GPS offsets, once in reverse,
    // plus one ride somewhere else entirely
    let mut rides = Vec::new();
    for i in 0..5 {
        rides.push(straight_ride(45.0, 7.0 + 0.00002 * i as f64, false));
    }
    rides.push(straight_ride(45.0, 7.0, true));
    rides.push(straight_ride(48.85, 2.35, false));

    let detector = SegmentDetector::default();
    let start = Instant::now();
    let results = detector.detect_batch(&rides);
    println!("Detected {} rides in {:?}\n", results.len(), start.elapsed());

    let config = SegmentMatchConfig::default();
    let mut library = SegmentLibraryIndex::new(Vec::new());

    for (ride, result) in results.iter().enumerate() {
        for segment in &result.segments {
            let matches = library.find_matches(segment, &config);
            match resolve_library_action(&matches, 0.8) {
                LibraryAction::Merge { segment_id, overlap_ratio } => {
                    println!(
                        "ride {}: merged into {} ({:.0}% overlap, {:?})",
                        ride,
                        segment_id,
                        overlap_ratio * 100.0,
                        matches[0].direction
                    );
                }
                LibraryAction::Insert => {
                    let id = format!("segment-{}", library.len() + 1);
                    println!("ride {}: new {} ({:.0}m)", ride, id, segment.distance_meters);
                    library.insert(StoredSegment::from_detected(id, segment));
                }
            }
        }
    }

    println!("\nLibrary holds {} segments", library.len());
}

fn straight_ride(lat: f64, lng: f64, reverse: bool) -> ActivityStreams {
    let mut coords: Vec<GpsPoint> = (0..300)
        .map(|i| GpsPoint::new(lat + i as f64 * 10.0 / 111_195.0, lng))
        .collect();
    if reverse {
        coords.reverse();
    }
    let n = coords.len();
    ActivityStreams::new(coords)
        .with_altitude(vec![100.0; n])
        .with_velocity(vec![9.0; n])
}
