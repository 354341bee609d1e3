//! CSV and console rendering of batch aggregates.
//!
//! One writer per report kind, each with its own row type.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::aggregate::{DailyRow, HourlyRow, Totals};

// ---

pub const HOURLY_FILE: &str = "hourly_data.csv";
pub const DAILY_FILE: &str = "daily_data.csv";

const HOURLY_HEADERS: [&str; 3] = ["Date", "Hour", "kWh Value"];
const DAILY_HEADERS: [&str; 2] = ["Date", "kWh Value"];

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    // ---
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(csv::WriterBuilder::new().has_headers(false).from_writer(file))
}

/// Write hourly rows (already sorted) with a `Date,Hour,kWh Value` header.
pub fn write_hourly_csv(path: &Path, rows: &[HourlyRow]) -> Result<()> {
    // ---
    let mut writer = csv_writer(path)?;
    writer.write_record(HOURLY_HEADERS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

/// Write daily rows (already sorted) with a `Date,kWh Value` header.
pub fn write_daily_csv(path: &Path, rows: &[DailyRow]) -> Result<()> {
    // ---
    let mut writer = csv_writer(path)?;
    writer.write_record(DAILY_HEADERS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

/// Create `dir` if needed and write both reports into it.
pub fn save_reports(dir: &Path, totals: &Totals) -> Result<()> {
    // ---
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let hourly_path = dir.join(HOURLY_FILE);
    write_hourly_csv(&hourly_path, &totals.hourly_rows())?;
    tracing::info!("Wrote {}", hourly_path.display());

    let daily_path = dir.join(DAILY_FILE);
    write_daily_csv(&daily_path, &totals.daily_rows())?;
    tracing::info!("Wrote {}", daily_path.display());

    Ok(())
}

/// Render both aggregates as aligned text tables.
pub fn print_tables<W: Write>(out: &mut W, totals: &Totals) -> std::io::Result<()> {
    // ---
    writeln!(out, "Hourly Data:")?;
    writeln!(out, "{:<8}{:<8}{}", "Date", "Hour", "kWh Value")?;
    for row in totals.hourly_rows() {
        writeln!(out, "{:<8}{:<8}{}", row.date, row.hour, row.kwh_value)?;
    }
    writeln!(out)?;

    writeln!(out, "Daily Data:")?;
    writeln!(out, "{:<8}{}", "Date", "kWh Value")?;
    for row in totals.daily_rows() {
        writeln!(out, "{:<8}{}", row.date, row.kwh_value)?;
    }
    Ok(())
}
