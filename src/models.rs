//! Simple data models for the kWh rollup pipeline.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// ---

/// Raw reading as it appears in the input document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawReading {
    // ---
    pub timestamp: String,
    #[serde(rename = "kWh_value")]
    pub kwh_value: f64,
}

/// Reading with a parsed, UTC-normalized timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    // ---
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// One aggregated row as stored and served by the service variant.
///
/// `window_start` is the inclusive start of the hour or day window the
/// value was summed over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    // ---
    pub window_start: DateTime<Utc>,
    pub kwh_value: f64,
}

/// Parse an RFC 3339 timestamp (date, time and offset) into UTC.
///
/// No other format is accepted: the date/time separator must be an
/// uppercase `T` and a UTC suffix an uppercase `Z`.
/// `2024-01-01T05:00:00+02:00` becomes `2024-01-01T03:00:00Z`.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ParseError> {
    // ---
    // chrono's RFC 3339 parser also takes ' ', 't' and 'z'
    let bytes = input.as_bytes();
    if bytes.get(10) != Some(&b'T') || bytes.last() == Some(&b'z') {
        return Err(ParseError::Layout {
            input: input.to_string(),
        });
    }

    DateTime::parse_from_rfc3339(input)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|source| ParseError::Timestamp {
            input: input.to_string(),
            source,
        })
}

impl RawReading {
    // ---
    pub fn to_reading(&self) -> Result<Reading, ParseError> {
        // ---
        Ok(Reading {
            timestamp: parse_timestamp(&self.timestamp)?,
            value: self.kwh_value,
        })
    }
}

/// Parse a batch of raw readings, skipping (and logging) the ones whose
/// timestamp is malformed. Returns the valid readings in input order and the
/// number of skipped records.
pub fn parse_readings(raw: &[RawReading]) -> (Vec<Reading>, usize) {
    // ---
    let mut readings = Vec::with_capacity(raw.len());
    let mut skipped = 0;

    for (i, record) in raw.iter().enumerate() {
        match record.to_reading() {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                tracing::warn!(index = i, "Skipping reading: {}", e);
                skipped += 1;
            }
        }
    }

    (readings, skipped)
}

/// Read a JSON array of raw readings from `path`.
///
/// A missing file or a document that is not an array of readings is an
/// error for the whole run; bad timestamps are dealt with later, per record.
pub fn load_raw_readings(path: &Path) -> anyhow::Result<Vec<RawReading>> {
    // ---
    let file =
        File::open(path).with_context(|| format!("Failed to open input {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to decode JSON from {}", path.display()))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn raw(ts: &str, value: f64) -> RawReading {
        // ---
        RawReading {
            timestamp: ts.to_string(),
            kwh_value: value,
        }
    }

    #[test]
    fn test_parse_utc_timestamp() {
        // ---
        let ts = parse_timestamp("2024-01-01T05:30:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 5, 30, 0).unwrap());
    }

    #[test]
    fn test_offset_is_normalized_to_utc() {
        // ---
        let ts = parse_timestamp("2024-01-01T01:15:00+02:00").unwrap();

        // 01:15 at +02:00 is 23:15 on the previous UTC day
        assert_eq!(ts.hour(), 23);
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 12, 31, 23, 15, 0).unwrap());
    }

    #[test]
    fn test_rejects_other_formats() {
        // ---
        assert!(parse_timestamp("2024-01-01 05:00:00").is_err());
        assert!(parse_timestamp("2024-01-01T05:00:00").is_err());
        assert!(parse_timestamp("01/01/2024 05:00").is_err());
        assert!(parse_timestamp("").is_err());

        // Separator and UTC suffix are case and character exact
        assert!(parse_timestamp("2024-01-01 05:00:00Z").is_err());
        assert!(parse_timestamp("2024-01-01t05:00:00Z").is_err());
        assert!(parse_timestamp("2024-01-01T05:00:00z").is_err());
        assert!(parse_timestamp("2024-01-01t05:00:00z").is_err());
        assert!(parse_timestamp("2024-01-01 05:00:00+01:00").is_err());
    }

    #[test]
    fn test_fractional_seconds_accepted() {
        // ---
        let ts = parse_timestamp("2024-01-01T05:00:00.250Z").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_error_names_input() {
        // ---
        let err = raw("yesterday", 1.0).to_reading().unwrap_err();
        assert!(err.to_string().contains("\"yesterday\""));
    }

    #[test]
    fn test_malformed_readings_are_skipped() {
        // ---
        let input = vec![
            raw("2024-01-01T05:00:00Z", 10.0),
            raw("not a timestamp", 99.0),
            raw("2024-01-01T06:00:00Z", 5.0),
        ];

        let (readings, skipped) = parse_readings(&input);

        assert_eq!(skipped, 1);
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].value, 10.0);
        assert_eq!(readings[1].value, 5.0);
    }

    #[test]
    fn test_load_raw_readings() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"[{"timestamp": "2024-01-01T05:00:00Z", "kWh_value": 2.5}]"#,
        )
        .unwrap();

        let loaded = load_raw_readings(&path).unwrap();
        assert_eq!(loaded.len(), 1);

        assert!(load_raw_readings(&dir.path().join("missing.json")).is_err());

        std::fs::write(&path, "{not json").unwrap();
        assert!(load_raw_readings(&path).is_err());
    }

    #[test]
    fn test_raw_reading_json_field_names() {
        // ---
        let json = r#"[{"timestamp": "2024-01-01T05:00:00Z", "kWh_value": 1.5}]"#;
        let parsed: Vec<RawReading> = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].kwh_value, 1.5);
        assert_eq!(parsed[0].timestamp, "2024-01-01T05:00:00Z");
    }
}
