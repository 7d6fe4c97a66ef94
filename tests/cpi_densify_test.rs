use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const HEADER: &str = "Year,Jan,Feb,Mar,Apr,May,Jun,Jul,Aug,Sep,Oct,Nov,Dec,HALF1,HALF2\n";

fn write_table(path: &Path, body: &str) {
    fs::write(path, format!("{HEADER}{body}")).expect("write table");
}

fn cpi_cmd(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("cpi-sync");
    cmd.current_dir(root)
        .env("CPI_HOME", root)
        .env("CPI_CONFIG_PATH", root.join("missing.toml"))
        .env("CPI_DATASETS_DIR", root.join("datasets"))
        .env("CPI_LOGS_DIR", root.join("logs"));
    cmd
}

#[test]
fn densify_writes_interpolated_daily_series() {
    let tmp = tempdir().expect("tempdir");
    let table = tmp.path().join("CPI_U.csv");
    let daily = tmp.path().join("daily.csv");
    write_table(&table, "2020,100,102,,,,,,,,,,,,\n");

    cpi_cmd(tmp.path())
        .arg("densify")
        .arg("--table")
        .arg(&table)
        .arg("--daily")
        .arg(&daily)
        .args(["--as-of", "2020-03-10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("densify: ok"))
        .stdout(predicate::str::contains("first_date=2020-01-01"))
        .stdout(predicate::str::contains("last_date=2020-02-29"));

    let out = fs::read_to_string(&daily).expect("read daily");
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("timestamp;CPI;daily_multiplicator"));
    assert_eq!(lines.next(), Some("2020-01-01;100.0000;1.000000"));
    assert!(out.contains("\n2020-01-15;100.9032;"));
    assert!(out.contains("\n2020-02-01;102.0000;"));
    assert_eq!(out.lines().count(), 1 + 60);

    let audit = fs::read_to_string(tmp.path().join("logs/audit.log")).expect("audit log");
    assert!(audit.contains("\"phase\":\"densify\""));
}

#[test]
fn densify_dry_run_leaves_daily_file_alone() {
    let tmp = tempdir().expect("tempdir");
    let table = tmp.path().join("CPI_U.csv");
    let daily = tmp.path().join("daily.csv");
    write_table(&table, "2020,100,102,,,,,,,,,,,,\n");

    cpi_cmd(tmp.path())
        .arg("densify")
        .arg("--table")
        .arg(&table)
        .arg("--daily")
        .arg(&daily)
        .args(["--as-of", "2020-03-10", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("daily_rows=60"));

    assert!(!daily.exists());
}

#[test]
fn densify_fails_when_table_is_missing() {
    let tmp = tempdir().expect("tempdir");

    cpi_cmd(tmp.path())
        .arg("densify")
        .arg("--table")
        .arg(tmp.path().join("nope.csv"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("issue: missing CPI table"));
}

#[test]
fn densify_json_report_has_details() {
    let tmp = tempdir().expect("tempdir");
    let table = tmp.path().join("CPI_U.csv");
    write_table(&table, "2020,100,102,,,,,,,,,,,,\n");

    let output = cpi_cmd(tmp.path())
        .args(["--json", "densify", "--dry-run", "--as-of", "2020-03-10"])
        .arg("--table")
        .arg(&table)
        .output()
        .expect("run");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["command"], "densify");
    assert_eq!(report["ok"], true);
    let details = report["details"].as_array().expect("details");
    assert!(details.iter().any(|d| d == "daily_rows=60"));
}
