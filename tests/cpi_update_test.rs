use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const HEADER: &str = "Year,Jan,Feb,Mar,Apr,May,Jun,Jul,Aug,Sep,Oct,Nov,Dec,HALF1,HALF2\n";

fn cpi_cmd(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("cpi-sync");
    cmd.current_dir(root)
        .env("CPI_HOME", root)
        .env("CPI_CONFIG_PATH", root.join("missing.toml"))
        .env("CPI_LOGS_DIR", root.join("logs"))
        // nothing listens here; any fetch fails fast
        .env("CPI_BLS_URL", "http://127.0.0.1:9/")
        .env("CPI_MAX_ATTEMPTS", "1")
        .env("CPI_RETRY_BACKOFF_MS", "0")
        .env("CPI_REQUEST_TIMEOUT_SECS", "2");
    cmd
}

#[test]
fn up_to_date_clean_table_is_a_no_op() {
    let tmp = tempdir().expect("tempdir");
    let table = tmp.path().join("CPI_U.csv");
    let daily = tmp.path().join("daily.csv");
    let original = format!("{HEADER}2024,308.4,310.3,,,,,,,,,,,,\n");
    fs::write(&table, &original).expect("write table");

    cpi_cmd(tmp.path())
        .arg("update")
        .arg("--table")
        .arg(&table)
        .arg("--daily")
        .arg(&daily)
        .args(["--end-year", "2019", "--as-of", "2024-03-10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=unchanged"));

    assert_eq!(fs::read_to_string(&table).expect("table"), original);
    assert!(!daily.exists());
}

#[test]
fn placeholders_are_persisted_even_without_new_data() {
    let tmp = tempdir().expect("tempdir");
    let table = tmp.path().join("CPI_U.csv");
    let daily = tmp.path().join("daily.csv");
    fs::write(&table, format!("{HEADER}2024,308.4,310.3,-,,,,,,,,,,,\n")).expect("write table");

    cpi_cmd(tmp.path())
        .arg("update")
        .arg("--table")
        .arg(&table)
        .arg("--daily")
        .arg(&daily)
        .args(["--end-year", "2019", "--as-of", "2024-03-10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("normalized=true"));

    assert_eq!(
        fs::read_to_string(&table).expect("table"),
        format!("{HEADER}2024,308.4,310.3,,,,,,,,,,,,\n")
    );
    let out = fs::read_to_string(&daily).expect("daily");
    assert!(out.starts_with("timestamp;CPI;daily_multiplicator\n2024-01-01;308.4000;1.000000\n"));
}

#[test]
fn remote_failure_leaves_files_untouched() {
    let tmp = tempdir().expect("tempdir");
    let table = tmp.path().join("CPI_U.csv");
    let daily = tmp.path().join("daily.csv");
    let original = format!("{HEADER}2024,308.4,-,,,,,,,,,,,,\n");
    fs::write(&table, &original).expect("write table");

    cpi_cmd(tmp.path())
        .arg("update")
        .arg("--table")
        .arg(&table)
        .arg("--daily")
        .arg(&daily)
        .args(["--end-year", "2024", "--as-of", "2024-03-10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E003_REMOTE_FETCH"));

    assert_eq!(fs::read_to_string(&table).expect("table"), original);
    assert!(!daily.exists());
}

#[test]
fn unwritable_logs_dir_is_reported_at_debug_level() {
    let tmp = tempdir().expect("tempdir");
    let table = tmp.path().join("CPI_U.csv");
    fs::write(&table, format!("{HEADER}2024,308.4,,,,,,,,,,,,,\n")).expect("write table");
    let logs_file = tmp.path().join("logs-is-a-file");
    fs::write(&logs_file, "x").expect("write blocker");

    cpi_cmd(tmp.path())
        .env("CPI_LOGS_DIR", &logs_file)
        .arg("--debug")
        .arg("update")
        .arg("--table")
        .arg(&table)
        .args(["--end-year", "2024", "--as-of", "2024-03-10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to record update failure in audit log"));
}

#[test]
fn daily_write_failure_keeps_table_so_next_run_rewrites_both() {
    let tmp = tempdir().expect("tempdir");
    let table = tmp.path().join("CPI_U.csv");
    let original = format!("{HEADER}2024,308.4,310.3,-,,,,,,,,,,,\n");
    fs::write(&table, &original).expect("write table");
    fs::write(tmp.path().join("blocker"), "x").expect("write blocker");

    cpi_cmd(tmp.path())
        .arg("update")
        .arg("--table")
        .arg(&table)
        .arg("--daily")
        .arg(tmp.path().join("blocker/daily.csv"))
        .args(["--end-year", "2019", "--as-of", "2024-03-10"])
        .assert()
        .failure();
    assert_eq!(fs::read_to_string(&table).expect("table"), original);

    let daily = tmp.path().join("daily.csv");
    cpi_cmd(tmp.path())
        .arg("update")
        .arg("--table")
        .arg(&table)
        .arg("--daily")
        .arg(&daily)
        .args(["--end-year", "2019", "--as-of", "2024-03-10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=normalized"));
    assert!(daily.exists());
}
