use anyhow::Result;
use chrono::{Datelike, Utc};
use std::path::PathBuf;

use crate::commands::{CommandReport, format_years};
use crate::cpi::config::{load_config, unknown_env_keys};
use crate::cpi::gaps::GapAnalyzer;
use crate::cpi::paths::resolve_paths;
use crate::cpi::table::MonthlyTable;

#[derive(Debug, Clone, Default)]
pub struct CpiStatusOptions {
    pub table: Option<PathBuf>,
    pub end_year: Option<i32>,
    pub lookback_years: Option<u32>,
}

pub fn run(opts: &CpiStatusOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths();
    let mut report = CommandReport::new("status");

    let table_file = opts.table.clone().unwrap_or(paths.table_file);
    let end_year = opts.end_year.unwrap_or_else(|| Utc::now().year());
    let lookback_years = opts.lookback_years.unwrap_or(cfg.series.lookback_years);

    report.detail(format!("series_id={}", cfg.series.series_id));
    report.detail(format!("datasets_dir={}", paths.datasets_dir.display()));
    report.detail(format!("table={}", table_file.display()));
    report.detail(format!("daily={}", paths.daily_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("timezone={}", cfg.daily.timezone));

    let unknown = unknown_env_keys();
    if !unknown.is_empty() {
        report.issue(format!("unknown CPI_* environment keys: {}", unknown.join(",")));
    }

    if !table_file.exists() {
        report.issue(format!("missing CPI table {}", table_file.display()));
        return Ok(report);
    }

    let loaded = MonthlyTable::load(&table_file)?;
    let table = &loaded.table;
    report.detail(format!("rows={}", table.rows().len()));
    if let (Some(min), Some(max)) = (table.min_year(), table.max_year()) {
        report.detail(format!("years={min}-{max}"));
    }
    report.detail(format!("needs_normalization={}", loaded.normalized));

    let analyzer = GapAnalyzer::new(table);
    let latest = match analyzer.latest_filled_month() {
        Ok(latest) => latest,
        Err(err) => {
            report.issue(err.to_string());
            return Ok(report);
        }
    };
    let window = analyzer.fetch_window(lookback_years, end_year)?;

    report.detail(format!("latest_filled={latest}"));
    report.detail(format!("resume={}", window.resume));
    if let Some(hole) = analyzer.earliest_hole() {
        report.detail(format!("earliest_hole={hole}"));
    }
    report.detail(format!("hole_years={}", format_years(&window.hole_years)));
    if window.is_up_to_date() {
        report.detail(format!("window=up-to-date (end_year={end_year})"));
    } else {
        report.detail(format!("window={}-{}", window.start_year, window.end_year));
    }

    Ok(report)
}
