use std::fs;
use std::path::Path;

use assert_cmd::Command;
use sirfit::report::FitSummary;
use tempfile::tempdir;

const TABLE: &str = "\
Province/State,Country/Region,Lat,Long,2/14/20,2/15/20,2/16/20,2/17/20,2/18/20,2/19/20,2/20/20,2/21/20
Washington,US,47.4,-121.5,1,2,3,5,8,13,20,30
Michigan,US,43.3,-84.5,0,0,0,0,0,0,0,0
";

fn write_table(dir: &Path) -> String {
    let path = dir.join("confirmed.csv");
    fs::write(&path, TABLE).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn fits_and_writes_outputs() {
    let dir = tempdir().unwrap();
    let data = write_table(dir.path());
    let out = dir.path().join("out");

    let output = Command::cargo_bin("sirfit")
        .unwrap()
        .args(["--data", data.as_str(), "--region", "Washington", "--horizon", "30"])
        .arg("--output-dir")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Washington: beta="), "{stdout}");

    let table = fs::read_to_string(out.join("washington_forecast.csv")).unwrap();
    let mut lines = table.lines();
    assert_eq!(
        lines.next(),
        Some("date,observed,susceptible,infected,recovered")
    );
    assert_eq!(lines.count(), 30);

    let summary: FitSummary =
        serde_json::from_str(&fs::read_to_string(out.join("washington_fit.json")).unwrap())
            .unwrap();
    assert_eq!(summary.observed_days, 7);
    assert!(summary.loss.is_finite());
    assert!(summary.beta > 0.0 && summary.beta <= 0.4);
    assert!(summary.gamma > 0.0 && summary.gamma <= 0.4);
}

#[test]
fn unknown_region_fails() {
    let dir = tempdir().unwrap();
    let data = write_table(dir.path());
    let output = Command::cargo_bin("sirfit")
        .unwrap()
        .args(["--data", data.as_str(), "--region", "Atlantis"])
        .arg("--output-dir")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Atlantis"), "{stderr}");
}

#[test]
fn missing_data_file_fails() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("sirfit")
        .unwrap()
        .args(["--data", "/nonexistent/confirmed.csv", "--region", "Washington"])
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn invalid_config_fails() {
    let dir = tempdir().unwrap();
    let data = write_table(dir.path());
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{ "bounds": { "lower": 0.5, "upper": 0.1 } }"#).unwrap();
    Command::cargo_bin("sirfit")
        .unwrap()
        .args(["--data", data.as_str(), "--region", "Washington"])
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn log_level_writes_to_stderr() {
    let dir = tempdir().unwrap();
    let data = write_table(dir.path());
    let output = Command::cargo_bin("sirfit")
        .unwrap()
        .args([
            "--data",
            data.as_str(),
            "--region",
            "Washington",
            "--log-level",
            "info",
            "--time-budget",
            "30s",
        ])
        .arg("--output-dir")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("INFO"), "{stderr}");
    assert!(stderr.contains("sirfit::pipeline"), "{stderr}");
}

#[test]
fn too_few_observations_fail() {
    // Starting on the last column leaves a single day to fit.
    let dir = tempdir().unwrap();
    let data = write_table(dir.path());
    let output = Command::cargo_bin("sirfit")
        .unwrap()
        .args([
            "--data",
            data.as_str(),
            "--region",
            "Michigan",
            "--start-date",
            "2/21/20",
        ])
        .arg("--output-dir")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("observations"), "{stderr}");
}
