//! Batch entry point: load a trace dataset, run the overlap analysis, print
//! a summary of contacts found.
//!
//! Run with: cargo run --features cli --bin trace-overlaps -- dataset.csv

use clap::Parser;
#[cfg(feature = "parallel")]
use contact_tracer::CancelFlag;
use contact_tracer::{load_csv_path, AnalysisConfig, LoadMode, PopulationSnapshot, TraceError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "trace-overlaps", version, about = "Contact-tracing overlap detection over a recorded trace dataset")]
struct Cli {
    /// CSV dataset with columns: name, lat, lon, date, time, condition
    dataset: PathBuf,

    /// Microcell radius in meters (inclusive)
    #[arg(long, default_value_t = 2.0)]
    radius_meters: f64,

    /// Temporal relevance window in seconds
    #[arg(long, default_value_t = 60)]
    time_window_secs: i64,

    /// Abort on the first malformed record instead of skipping it
    #[arg(long)]
    strict: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), TraceError> {
    let mode = if cli.strict { LoadMode::Strict } else { LoadMode::Lenient };
    let config = AnalysisConfig {
        radius_meters: cli.radius_meters,
        time_window: chrono::Duration::seconds(cli.time_window_secs),
    };
    // Configuration problems surface before any loading or analysis work.
    config.validate()?;

    let (trajectories, summary) = load_csv_path(&cli.dataset, mode)?;
    let snapshot = PopulationSnapshot::new(trajectories)?;

    #[cfg(feature = "parallel")]
    let report = contact_tracer::analyze_parallel(&snapshot, &config, &CancelFlag::new())?;

    #[cfg(not(feature = "parallel"))]
    let report = contact_tracer::analyze(&snapshot, &config)?;

    println!("dataset: {}", cli.dataset.display());
    println!("records loaded:  {}", summary.loaded);
    println!("records skipped: {}", summary.skipped);
    for issue in &summary.issues {
        println!("  line {}: {}", issue.line, issue.reason);
    }
    println!("persons:         {}", report.persons);
    for trajectory in snapshot.trajectories() {
        println!(
            "  {}: {} readings, {:.1} m traveled",
            trajectory.person_id(),
            trajectory.len(),
            trajectory.path_length_meters()
        );
    }
    println!(
        "radius: {} m, time window: {} s",
        config.radius_meters,
        config.time_window.num_seconds()
    );
    println!("overlaps found:  {}", report.events.len());

    for event in &report.events {
        println!(
            "  {} @ node {} <-> {} @ node {}: {:.2} m apart ({} / {})",
            event.a.person_id,
            event.a.node,
            event.b.person_id,
            event.b.node,
            event.distance_meters,
            event.a.timestamp.format("%d-%m-%Y %H:%M"),
            event.b.timestamp.format("%d-%m-%Y %H:%M"),
        );
    }

    let risky = report.events.iter().filter(|e| e.involves_sick()).count();
    if risky > 0 {
        println!("contacts involving a sick person: {risky}");
    }

    if !report.complete {
        println!("warning: analysis was cancelled, results are partial");
    }

    Ok(())
}
