use std::fs;
use std::process::Command;

use anyhow::Result;

const INPUT: &str = r#"[
    {"timestamp": "2024-01-02T00:15:00Z", "kWh_value": 1.25},
    {"timestamp": "2024-01-01T05:00:00Z", "kWh_value": 10.0},
    {"timestamp": "2024-01-01T05:30:00Z", "kWh_value": 5.0},
    {"timestamp": "2024/01/01 06:00", "kWh_value": 100.0},
    {"timestamp": "2024-01-01T23:00:00Z", "kWh_value": 2.0}
]"#;

#[test]
fn aggregate_command_writes_sorted_reports() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("data.json");
    let output = dir.path().join("output_data");
    fs::write(&input, INPUT)?;

    let status = Command::new(env!("CARGO_BIN_EXE_kwh-rollup"))
        .arg("aggregate")
        .arg("--input")
        .arg(&input)
        .arg("--output-dir")
        .arg(&output)
        .env("FORCE_COLOR", "0")
        .status()?;
    assert!(status.success());

    let hourly = fs::read_to_string(output.join("hourly_data.csv"))?;
    assert_eq!(
        hourly,
        "Date,Hour,kWh Value\n\
         01/01,05:00,15.00\n\
         01/01,23:00,2.00\n\
         02/01,00:00,1.25\n"
    );

    let daily = fs::read_to_string(output.join("daily_data.csv"))?;
    assert_eq!(daily, "Date,kWh Value\n01/01,17.00\n02/01,1.25\n");

    Ok(())
}

#[test]
fn aggregate_twice_is_identical() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("data.json");
    fs::write(&input, INPUT)?;

    let mut outputs = Vec::new();
    for run in ["first", "second"] {
        let output = dir.path().join(run);
        let status = Command::new(env!("CARGO_BIN_EXE_kwh-rollup"))
            .args(["aggregate", "--input"])
            .arg(&input)
            .arg("--output-dir")
            .arg(&output)
            .status()?;
        assert!(status.success());
        outputs.push((
            fs::read(output.join("hourly_data.csv"))?,
            fs::read(output.join("daily_data.csv"))?,
        ));
    }

    assert_eq!(outputs[0], outputs[1]);
    Ok(())
}

#[test]
fn print_flag_renders_tables() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("data.json");
    fs::write(&input, INPUT)?;

    let out = Command::new(env!("CARGO_BIN_EXE_kwh-rollup"))
        .args(["aggregate", "--print", "--input"])
        .arg(&input)
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .output()?;
    assert!(out.status.success());

    let stdout = String::from_utf8(out.stdout)?;
    assert!(stdout.starts_with("Hourly Data:\n"));
    assert!(stdout.contains("Daily Data:\n"));
    assert!(stdout.ends_with("Data saved successfully.\n"));

    Ok(())
}

#[test]
fn missing_input_fails_the_run() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("out");

    let status = Command::new(env!("CARGO_BIN_EXE_kwh-rollup"))
        .arg("aggregate")
        .arg("--input")
        .arg(dir.path().join("nope.json"))
        .arg("--output-dir")
        .arg(&output)
        .status()?;

    assert!(!status.success());
    assert!(!output.exists());
    Ok(())
}
