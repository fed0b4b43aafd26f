//! Basic example of detecting segments in a synthetic ride.
//!
//! Run with: cargo run --example basic_detection

use segment_engine::{
    analyze_obstruction, classify_power_zone, classify_topology, ActivityStreams, GpsPoint,
    SegmentConfig, SegmentDetector,
};

fn main() {
    // 1 Hz ride heading north: 2km flat, 2km climbing at 6%, a long stop, then 2km flat
    let mut latlng = Vec::new();
    let mut altitude = Vec::new();
    let mut velocity = Vec::new();
    let mut watts = Vec::new();
    let mut distance = 0.0;
    let mut elevation = 50.0;

    let mut push = |speed: f64, grade: f64, power: f64| {
        distance += speed;
        elevation += speed * grade;
        latlng.push(GpsPoint::new(45.0 + distance / 111_195.0, 7.0));
        altitude.push(elevation);
        velocity.push(speed);
        watts.push(power);
    };

    for _ in 0..200 {
        push(10.0, 0.0, 180.0);
    }
    for _ in 0..333 {
        push(6.0, 0.06, 260.0);
    }
    for _ in 0..180 {
        push(0.0, 0.0, 0.0);
    }
    for _ in 0..200 {
        push(10.0, 0.0, 170.0);
    }

    let n = latlng.len();
    let streams = ActivityStreams::new(latlng)
        .with_altitude(altitude)
        .with_velocity(velocity)
        .with_watts(watts)
        .with_time((0..n).map(|i| i as f64).collect());

    let detector = SegmentDetector::new(SegmentConfig::default()).unwrap();
    let result = detector.detect(&streams);

    println!("Segment Detection Example\n");
    println!(
        "Ride: {} points, {:.0}m, {:.0}s, +{:.0}m / -{:.0}m, {} stops\n",
        result.total_points,
        result.total_distance,
        result.total_duration,
        result.total_elevation_gain,
        result.total_elevation_loss,
        result.stops.len()
    );

    for (i, segment) in result.segments.iter().enumerate() {
        let obstruction = analyze_obstruction(segment);
        let topology = classify_topology(&segment.coordinates);
        println!("{}. {} ({:?})", i + 1, segment.terrain_type, topology);
        println!(
            "   {:.0}m at {:.1}% avg, +{:.0}m",
            segment.distance_meters, segment.avg_gradient, segment.elevation_gain
        );
        if let Some(np) = segment.normalized_power {
            println!("   NP {:.0}W ({:?} at 250W FTP)", np, classify_power_zone(np, 250.0));
        }
        println!(
            "   quality {:.0}, obstruction {:.0}, steady-state: {}\n",
            segment.quality_score, obstruction.score, obstruction.suitable_for_steady_state
        );
    }
}
