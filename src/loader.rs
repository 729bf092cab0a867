//! # Trace Loader
//!
//! Parses raw trace records into per-person trajectories.
//!
//! The input is header-delimited, comma-separated text with the columns
//! `name, lat, lon, date, time, condition` (a leading unnamed index column,
//! as written by common dataframe exporters, is tolerated and ignored):
//!
//! ```text
//! ,name,lat,lon,date,time,condition
//! 0,QHTWZHH,18.565374,73.909405,07-04-2020,1710,healthy
//! 1,QHTWZHH,18.565402,73.909377,07-04-2020,1711,healthy
//! ```
//!
//! `date` is `DD-MM-YYYY`; `time` is an hour-minute concatenation tolerant of
//! both zero-padded (`"1710"`) and unpadded (`"945"`) forms.
//!
//! Loading follows a skip-and-log policy by default: one malformed record is
//! logged and skipped without aborting the dataset, and the [`LoadSummary`]
//! reports every skip with its line number. [`LoadMode::Strict`] turns the
//! first malformed record into a fatal [`TraceError::InvalidInput`] instead.

use crate::{Condition, GeoPoint, LocationSample, TraceError, Trajectory};
use chrono::{NaiveDate, NaiveTime};
use csv::{ReaderBuilder, StringRecord};
use log::{info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Recovery policy for malformed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Skip malformed records, log them, and keep loading.
    #[default]
    Lenient,
    /// Abort on the first malformed record.
    Strict,
}

/// One skipped record and why.
#[derive(Debug, Clone)]
pub struct LoadIssue {
    /// 1-based line number in the input.
    pub line: u64,
    pub reason: String,
}

/// What happened during a load: fed into the batch entry point's summary.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: usize,
    pub issues: Vec<LoadIssue>,
}

/// Column indices resolved from the header row.
struct Columns {
    name: usize,
    lat: usize,
    lon: usize,
    date: usize,
    time: usize,
    condition: usize,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, TraceError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim().to_ascii_lowercase().as_str()))
        };

        let missing = |what: &str| {
            TraceError::input(format!("header row is missing the '{what}' column"))
        };

        Ok(Self {
            name: find(&["name"]).ok_or_else(|| missing("name"))?,
            lat: find(&["lat", "latitude"]).ok_or_else(|| missing("lat"))?,
            lon: find(&["lon", "lng", "longitude"]).ok_or_else(|| missing("lon"))?,
            date: find(&["date"]).ok_or_else(|| missing("date"))?,
            time: find(&["time"]).ok_or_else(|| missing("time"))?,
            condition: find(&["condition"]).ok_or_else(|| missing("condition"))?,
        })
    }
}

/// Load trace records from a reader and build one trajectory per person.
///
/// Persons are returned in first-seen order; each person's samples are
/// time-sorted by the trajectory builder.
///
/// # Errors
///
/// Fatal errors are a missing/unusable header, I/O failures, and (in strict
/// mode) the first malformed record. In lenient mode malformed records only
/// show up in the summary.
pub fn load_records<R: Read>(
    reader: R,
    mode: LoadMode,
) -> Result<(Vec<Trajectory>, LoadSummary), TraceError> {
    let mut csv = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);

    let columns = Columns::resolve(csv.headers()?)?;

    let mut order: Vec<String> = Vec::new();
    let mut by_person: HashMap<String, Vec<LocationSample>> = HashMap::new();
    let mut summary = LoadSummary::default();

    for result in csv.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        match parse_record(&record, &columns) {
            Ok(sample) => {
                by_person
                    .entry(sample.person_id.clone())
                    .or_insert_with(|| {
                        order.push(sample.person_id.clone());
                        Vec::new()
                    })
                    .push(sample);
                summary.loaded += 1;
            }
            Err(err) => {
                if mode == LoadMode::Strict {
                    return Err(TraceError::input(format!("line {line}: {err}")));
                }
                warn!("skipping record at line {line}: {err}");
                summary.skipped += 1;
                summary.issues.push(LoadIssue { line, reason: err.to_string() });
            }
        }
    }

    let mut trajectories = Vec::with_capacity(order.len());
    for person in order {
        let samples = by_person.remove(&person).unwrap_or_default();
        trajectories.push(Trajectory::build(&person, samples)?);
    }

    info!(
        "loaded {} records for {} persons ({} skipped)",
        summary.loaded,
        trajectories.len(),
        summary.skipped
    );

    Ok((trajectories, summary))
}

/// Load trace records from a CSV file on disk.
pub fn load_csv_path(
    path: impl AsRef<Path>,
    mode: LoadMode,
) -> Result<(Vec<Trajectory>, LoadSummary), TraceError> {
    let file = File::open(path.as_ref())?;
    load_records(file, mode)
}

fn parse_record(record: &StringRecord, columns: &Columns) -> Result<LocationSample, TraceError> {
    let field = |index: usize, what: &str| {
        record
            .get(index)
            .ok_or_else(|| TraceError::input(format!("missing '{what}' field")))
    };

    let name = field(columns.name, "name")?;
    if name.is_empty() {
        return Err(TraceError::input("empty 'name' field"));
    }

    let latitude = parse_coordinate(field(columns.lat, "lat")?, "lat")?;
    let longitude = parse_coordinate(field(columns.lon, "lon")?, "lon")?;
    let point = GeoPoint::new(latitude, longitude);
    if !point.is_valid() {
        return Err(TraceError::input(format!(
            "coordinates ({latitude}, {longitude}) are out of range"
        )));
    }

    let date = NaiveDate::parse_from_str(field(columns.date, "date")?, "%d-%m-%Y")
        .map_err(|e| TraceError::input(format!("bad date: {e}")))?;
    let time = parse_clock(field(columns.time, "time")?)?;
    let condition: Condition = field(columns.condition, "condition")?.parse()?;

    Ok(LocationSample {
        person_id: name.to_string(),
        point,
        timestamp: date.and_time(time),
        condition,
    })
}

fn parse_coordinate(raw: &str, what: &str) -> Result<f64, TraceError> {
    raw.parse::<f64>()
        .map_err(|_| TraceError::input(format!("bad '{what}' value '{raw}'")))
}

/// Parse an hour-minute concatenation, tolerant of a missing leading zero:
/// `"1710"` is 17:10 and `"945"` is 9:45.
fn parse_clock(raw: &str) -> Result<NaiveTime, TraceError> {
    let digits = raw.trim();
    if !(3..=4).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TraceError::input(format!(
            "bad time '{raw}' (expected HMM or HHMM digits)"
        )));
    }

    let (hour, minute) = digits.split_at(digits.len() - 2);
    let hour: u32 = hour.parse().map_err(|_| TraceError::input(format!("bad time '{raw}'")))?;
    let minute: u32 =
        minute.parse().map_err(|_| TraceError::input(format!("bad time '{raw}'")))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| TraceError::input(format!("time '{raw}' is out of range")))
}

// ============================================================================
// Tests
// ============================================================================
