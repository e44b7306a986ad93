//! PDH-CSV / PDH-TSV counter log import.
//!
//! Layout of a log written by perfmon or `relog`:
//!
//! ```text
//! "(PDH-CSV 4.0) (Pacific Standard Time)(480)","\\PC\Processor(_Total)\% Processor Time"
//! "05/01/2024 10:00:00.123","12.5"
//! ```
//!
//! The first header cell names the format, the local time zone and its bias
//! in minutes (UTC = local + bias). Every other header cell is a counter
//! path. Each row is a local timestamp followed by one formatted value per
//! counter; blank cells mean the counter had no valid data for that pass.

use crate::file_info::CounterFileInfo;
use crate::sample::{PerformanceCounterSample, PerformanceCounterSampleSet};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// PDH status for a value that could not be collected.
pub const PDH_CSTATUS_INVALID_DATA: u32 = 0xC000_0BBA;

const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S%.f";

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CounterLogErrorKind {
    Io,
    Csv,
    /// The first row is not a PDH header.
    Header,
    /// A row timestamp could not be parsed.
    Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterLogError {
    pub kind: CounterLogErrorKind,
    pub message: String,
}

impl CounterLogError {
    pub fn new(kind: CounterLogErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for CounterLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for CounterLogError {}

impl From<CounterLogError> for String {
    fn from(e: CounterLogError) -> Self {
        e.to_string()
    }
}

impl From<csv::Error> for CounterLogError {
    fn from(e: csv::Error) -> Self {
        Self::new(CounterLogErrorKind::Csv, e.to_string())
    }
}

// ─── Log ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CounterLogFormat {
    Csv,
    Tsv,
}

impl CounterLogFormat {
    fn delimiter(self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }

    /// `.tsv` files are tab separated, everything else comma separated.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => Self::Tsv,
            _ => Self::Csv,
        }
    }
}

/// A parsed counter log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterLog {
    pub version: String,
    pub time_zone: String,
    pub bias_minutes: i32,
    pub counter_paths: Vec<String>,
    pub sample_sets: Vec<PerformanceCounterSampleSet>,
}

impl CounterLog {
    pub fn file_info(&self) -> CounterFileInfo {
        CounterFileInfo::from_sample_sets(&self.sample_sets)
    }
}

/// Read a counter log from disk, choosing the delimiter from the extension.
pub fn read_counter_log(path: &Path) -> Result<CounterLog, CounterLogError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CounterLogError::new(
            CounterLogErrorKind::Io,
            format!("Failed to read {}: {}", path.display(), e),
        )
    })?;
    parse_counter_log(&content, CounterLogFormat::from_path(path))
}

pub fn parse_counter_log(
    content: &str,
    format: CounterLogFormat,
) -> Result<CounterLog, CounterLogError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter())
        .flexible(true)
        .has_headers(true)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let headers = reader.headers()?.clone();
    let first = headers.get(0).unwrap_or("");
    let (version, time_zone, bias_minutes) = parse_header(first)?;
    let counter_paths: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut sample_sets = Vec::new();
    for result in reader.records() {
        let record = result?;
        let stamp = record.get(0).unwrap_or("").trim();
        if stamp.is_empty() {
            continue;
        }
        let timestamp = parse_timestamp(stamp, bias_minutes)?;

        let samples = counter_paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let cell = record.get(i + 1).unwrap_or("").trim();
                logged_sample(path, cell, timestamp)
            })
            .collect();
        sample_sets.push(PerformanceCounterSampleSet::new(timestamp, samples));
    }

    debug!(
        "Counter log: {} counter(s), {} sample set(s)",
        counter_paths.len(),
        sample_sets.len()
    );

    Ok(CounterLog {
        version,
        time_zone,
        bias_minutes,
        counter_paths,
        sample_sets,
    })
}

fn logged_sample(path: &str, cell: &str, timestamp: DateTime<Utc>) -> PerformanceCounterSample {
    let value = cell.parse::<f64>().ok();
    PerformanceCounterSample {
        path: path.to_string(),
        instance_name: instance_of(path).to_string(),
        cooked_value: value.unwrap_or(0.0),
        timestamp,
        status: if value.is_some() { 0 } else { PDH_CSTATUS_INVALID_DATA },
        ..Default::default()
    }
}

/// `(PDH-CSV 4.0) (Pacific Standard Time)(480)` → version, zone, bias.
fn parse_header(cell: &str) -> Result<(String, String, i32), CounterLogError> {
    let groups: Vec<&str> = cell
        .split('(')
        .skip(1)
        .filter_map(|part| part.split(')').next())
        .map(str::trim)
        .collect();

    let bad = || {
        CounterLogError::new(
            CounterLogErrorKind::Header,
            format!("Not a PDH counter log header: {:?}", cell),
        )
    };

    match groups.as_slice() {
        [version, zone, bias, ..] if version.starts_with("PDH-") => {
            let bias = bias.parse::<i32>().map_err(|_| bad())?;
            Ok((version.to_string(), zone.to_string(), bias))
        }
        _ => Err(bad()),
    }
}

fn parse_timestamp(stamp: &str, bias_minutes: i32) -> Result<DateTime<Utc>, CounterLogError> {
    let local = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).map_err(|e| {
        CounterLogError::new(
            CounterLogErrorKind::Timestamp,
            format!("Invalid timestamp {:?}: {}", stamp, e),
        )
    })?;
    Ok(Utc.from_utc_datetime(&(local + Duration::minutes(i64::from(bias_minutes)))))
}

/// Instance part of `\\host\object(instance)\counter`, or `""`.
pub fn instance_of(path: &str) -> &str {
    let object = path
        .trim_start_matches('\\')
        .split('\\')
        .nth(1)
        .unwrap_or("");
    match (object.find('('), object.rfind(')')) {
        (Some(open), Some(close)) if close > open => &object[open + 1..close],
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const LOG: &str = r#""(PDH-CSV 4.0) (Pacific Standard Time)(480)","\\WEB01\Processor(_Total)\% Processor Time","\\WEB01\Memory\Available MBytes"
"05/01/2024 10:00:00.000"," ","2048"
"05/01/2024 10:00:15.000","12.5","2040"
"05/01/2024 10:00:30.000","7.25","2032"
"#;

    #[test]
    fn test_parse_csv_log() {
        let log = parse_counter_log(LOG, CounterLogFormat::Csv).unwrap();
        assert_eq!(log.version, "PDH-CSV 4.0");
        assert_eq!(log.time_zone, "Pacific Standard Time");
        assert_eq!(log.bias_minutes, 480);
        assert_eq!(log.counter_paths.len(), 2);
        assert_eq!(log.sample_sets.len(), 3);

        let first = &log.sample_sets[0];
        // 10:00 local + 480 minutes bias = 18:00 UTC
        assert_eq!(first.timestamp.hour(), 18);
        let cpu = &first.counter_samples[0];
        assert_eq!(cpu.instance_name, "_Total");
        assert_eq!(cpu.status, PDH_CSTATUS_INVALID_DATA);
        assert!(!cpu.is_valid());
        assert_eq!(first.counter_samples[1].cooked_value, 2048.0);

        let second = &log.sample_sets[1];
        assert_eq!(second.counter_samples[0].cooked_value, 12.5);
        assert!(second.counter_samples[0].is_valid());
        assert_eq!(second.counter_samples[1].instance_name, "");
    }

    #[test]
    fn test_file_info() {
        let log = parse_counter_log(LOG, CounterLogFormat::Csv).unwrap();
        let info = log.file_info();
        assert_eq!(info.sample_count(), 3);
        assert_eq!((info.newest_record() - info.oldest_record()).num_seconds(), 30);
    }

    #[test]
    fn test_parse_tsv_log() {
        let tsv = "\"(PDH-TSV 4.0) (UTC)(0)\"\t\"\\\\pc\\Memory\\Pages/sec\"\n\"01/02/2024 03:04:05.600\"\t\"9\"\n";
        let log = parse_counter_log(tsv, CounterLogFormat::Tsv).unwrap();
        assert_eq!(log.version, "PDH-TSV 4.0");
        assert_eq!(log.sample_sets[0].counter_samples[0].path, r"\\pc\Memory\Pages/sec");
        assert_eq!(log.sample_sets[0].timestamp.minute(), 4);
    }

    #[test]
    fn test_negative_bias() {
        let log = "\"(PDH-CSV 4.0) (W. Europe Standard Time)(-60)\",\"\\\\pc\\Memory\\Pages/sec\"\n\"01/02/2024 03:00:00.000\",\"1\"\n";
        let log = parse_counter_log(log, CounterLogFormat::Csv).unwrap();
        assert_eq!(log.sample_sets[0].timestamp.hour(), 2);
    }

    #[test]
    fn test_bad_header() {
        let err = parse_counter_log("\"Time\",\"Value\"\n", CounterLogFormat::Csv).unwrap_err();
        assert_eq!(err.kind, CounterLogErrorKind::Header);
    }

    #[test]
    fn test_bad_timestamp() {
        let log = "\"(PDH-CSV 4.0) (UTC)(0)\",\"\\\\pc\\Memory\\Pages/sec\"\n\"yesterday\",\"1\"\n";
        let err = parse_counter_log(log, CounterLogFormat::Csv).unwrap_err();
        assert_eq!(err.kind, CounterLogErrorKind::Timestamp);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(CounterLogFormat::from_path(Path::new("perf.TSV")), CounterLogFormat::Tsv);
        assert_eq!(CounterLogFormat::from_path(Path::new("perf.csv")), CounterLogFormat::Csv);
    }

    #[test]
    fn test_instance_of() {
        assert_eq!(instance_of(r"\\pc\LogicalDisk(C:)\% Free Space"), "C:");
        assert_eq!(instance_of(r"\\pc\Memory\Available MBytes"), "");
    }

    #[test]
    fn test_missing_file() {
        let err = read_counter_log(Path::new("/nonexistent/winops/perf.csv")).unwrap_err();
        assert_eq!(err.kind, CounterLogErrorKind::Io);
    }
}
