//! Basic example of detecting contact overlaps between three people.
//!
//! Run with: cargo run --example basic_tracing

use chrono::{Duration, NaiveDate};
use contact_tracer::{
    analyze, AnalysisConfig, Condition, GeoPoint, LocationSample, PopulationSnapshot, Trajectory,
};

fn main() {
    let day = NaiveDate::from_ymd_opt(2020, 4, 7).unwrap();
    let at = |hour, min| day.and_hms_opt(hour, min, 0).unwrap();

    let sample = |person: &str, lat, lng, timestamp, condition| LocationSample {
        person_id: person.to_string(),
        point: GeoPoint::new(lat, lng),
        timestamp,
        condition,
    };

    // Asha lingers around a market stall
    let asha = Trajectory::build(
        "asha",
        vec![
            sample("asha", 18.565374, 73.909405, at(17, 10), Condition::Sick),
            sample("asha", 18.565380, 73.909410, at(17, 11), Condition::Sick),
            sample("asha", 18.565374, 73.909405, at(17, 12), Condition::Sick),
        ],
    )
    .unwrap();

    // Bela passes the same stall a minute later
    let bela = Trajectory::build(
        "bela",
        vec![
            sample("bela", 18.565900, 73.909800, at(17, 11), Condition::Healthy),
            sample("bela", 18.565376, 73.909406, at(17, 12), Condition::Healthy),
            sample("bela", 18.564900, 73.909000, at(17, 13), Condition::Healthy),
        ],
    )
    .unwrap();

    // Chand visits the stall hours later: spatially close, temporally far
    let chand = Trajectory::build(
        "chand",
        vec![sample("chand", 18.565374, 73.909405, at(20, 45), Condition::Healthy)],
    )
    .unwrap();

    let snapshot = PopulationSnapshot::new(vec![asha, bela, chand]).unwrap();
    let config = AnalysisConfig {
        radius_meters: 2.0,
        time_window: Duration::seconds(60),
    };

    let report = analyze(&snapshot, &config).unwrap();

    println!("Contact Tracing Example\n");
    println!(
        "Config: radius={}m, time_window={}s\n",
        config.radius_meters,
        config.time_window.num_seconds()
    );
    println!(
        "Compared {} person-pairs, {} node pairs within radius",
        report.pairs_compared, report.pairs_within_radius
    );
    println!("Confirmed overlaps: {}\n", report.events.len());

    for event in &report.events {
        println!(
            "{} and {} were {:.2} m apart at {} / {}{}",
            event.a.person_id,
            event.b.person_id,
            event.distance_meters,
            event.a.timestamp.format("%H:%M"),
            event.b.timestamp.format("%H:%M"),
            if event.involves_sick() { "  [sick contact]" } else { "" },
        );
    }
}
