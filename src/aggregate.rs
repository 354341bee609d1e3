//! Batch aggregation of readings into hourly and daily totals.
//!
//! Readings are bucketed by their UTC calendar date and hour-of-day in a
//! single pass. Values are summed in input order so a fixed input always
//! produces bit-identical totals.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Timelike};
use serde::Serialize;

use crate::models::{parse_readings, RawReading, Reading};

// ---

/// date -> (hour-of-day -> kWh)
pub type HourlyTotals = BTreeMap<NaiveDate, BTreeMap<u32, f64>>;

/// date -> kWh
pub type DailyTotals = BTreeMap<NaiveDate, f64>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub hourly: HourlyTotals,
    pub daily: DailyTotals,
}

/// Result of aggregating a raw input document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub totals: Totals,
    /// Records dropped because their timestamp did not parse.
    pub skipped: usize,
}

/// Row of the hourly report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Hour")]
    pub hour: String,
    #[serde(rename = "kWh Value")]
    pub kwh_value: String,
}

/// Row of the daily report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "kWh Value")]
    pub kwh_value: String,
}

/// Bucket valid readings by date and hour.
pub fn aggregate(readings: &[Reading]) -> Totals {
    // ---
    let mut totals = Totals::default();

    for reading in readings {
        let date = reading.timestamp.date_naive();
        let hour = reading.timestamp.hour();

        *totals
            .hourly
            .entry(date)
            .or_default()
            .entry(hour)
            .or_insert(0.0) += reading.value;
        *totals.daily.entry(date).or_insert(0.0) += reading.value;
    }

    totals
}

/// Parse and aggregate a raw input document. Records with a malformed
/// timestamp are excluded from every bucket and counted in `skipped`.
pub fn aggregate_raw(raw: &[RawReading]) -> Aggregation {
    // ---
    let (readings, skipped) = parse_readings(raw);
    tracing::debug!(
        "Aggregating {} readings ({} skipped)",
        readings.len(),
        skipped
    );

    Aggregation {
        totals: aggregate(&readings),
        skipped,
    }
}

/// `DD/MM`, or `DD/MM/YYYY` when the report covers more than one year so
/// that every row's date stays unique.
fn date_label(date: NaiveDate, with_year: bool) -> String {
    if with_year {
        date.format("%d/%m/%Y").to_string()
    } else {
        date.format("%d/%m").to_string()
    }
}

fn hour_label(hour: u32) -> String {
    format!("{:02}:00", hour)
}

fn kwh_label(value: f64) -> String {
    format!("{:.2}", value)
}

impl Totals {
    // ---
    /// True when the readings cover more than one calendar year.
    pub fn spans_years(&self) -> bool {
        match (self.daily.keys().next(), self.daily.keys().next_back()) {
            (Some(first), Some(last)) => first.year() != last.year(),
            _ => false,
        }
    }

    /// Hourly rows sorted by date, then hour.
    pub fn hourly_rows(&self) -> Vec<HourlyRow> {
        // ---
        let with_year = self.spans_years();
        self.hourly
            .iter()
            .flat_map(|(date, hours)| {
                hours.iter().map(move |(hour, value)| HourlyRow {
                    date: date_label(*date, with_year),
                    hour: hour_label(*hour),
                    kwh_value: kwh_label(*value),
                })
            })
            .collect()
    }

    /// Daily rows sorted by date.
    pub fn daily_rows(&self) -> Vec<DailyRow> {
        // ---
        let with_year = self.spans_years();
        self.daily
            .iter()
            .map(|(date, value)| DailyRow {
                date: date_label(*date, with_year),
                kwh_value: kwh_label(*value),
            })
            .collect()
    }
}
