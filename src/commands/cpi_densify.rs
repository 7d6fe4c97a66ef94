use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::cpi::audit;
use crate::cpi::config::load_config;
use crate::cpi::densify::{densify_table, write_daily};
use crate::cpi::paths::resolve_paths;
use crate::cpi::table::MonthlyTable;
use crate::cpi::util::today_in;

#[derive(Debug, Clone, Default)]
pub struct CpiDensifyOptions {
    pub table: Option<PathBuf>,
    pub daily: Option<PathBuf>,
    pub as_of: Option<NaiveDate>,
    pub dry_run: bool,
}

pub fn run(opts: &CpiDensifyOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths();
    let mut report = CommandReport::new("densify");

    let table_file = opts.table.clone().unwrap_or(paths.table_file);
    let daily_file = opts.daily.clone().unwrap_or(paths.daily_file);
    let today = match opts.as_of {
        Some(day) => day,
        None => today_in(cfg.timezone()?),
    };

    report.detail(format!("table={}", table_file.display()));
    report.detail(format!("daily={}", daily_file.display()));
    report.detail(format!("today={today}"));

    if !table_file.exists() {
        report.issue(format!("missing CPI table {}", table_file.display()));
        return Ok(report);
    }

    let loaded = MonthlyTable::load(&table_file)?;
    if loaded.normalized {
        report.detail("table has placeholders; run `update` to persist the cleanup".to_string());
    }
    let daily = densify_table(&loaded.table, today)?;

    if let (Some(first), Some(last)) = (daily.first(), daily.last()) {
        report.detail(format!("first_date={}", first.date));
        report.detail(format!("last_date={}", last.date));
    }
    report.detail(format!("daily_rows={}", daily.len()));

    if opts.dry_run {
        report.detail("densify.dry_run=true".to_string());
        return Ok(report);
    }

    write_daily(&daily_file, &daily)?;
    audit::append_event(
        &paths.logs_dir,
        "densify",
        "ok",
        &format!("rows={} daily={}", daily.len(), daily_file.display()),
    )?;
    Ok(report)
}
