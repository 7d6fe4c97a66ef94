use crate::cpi::densify::{densify_table, write_daily};
use crate::cpi::gaps::{FetchWindow, GapAnalyzer};
use crate::cpi::merge::{self, MergeMode, MergeOutcome};
use crate::cpi::remote::{RetryPolicy, SeriesSource, extract_monthly_points, fetch_range};
use crate::cpi::table::{MonthlyTable, YearMonth};
use crate::cpi::util::sha256_hex;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub series_id: String,
    pub table_file: PathBuf,
    pub daily_file: PathBuf,
    pub end_year: i32,
    pub lookback_years: u32,
    pub mode: MergeMode,
    pub dry_run: bool,
    /// "Today" in the series' reference time zone; bounds the daily series.
    pub today: NaiveDate,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// New or revised monthly values were written.
    Applied,
    /// Only placeholder cleanup was written.
    Normalized,
    /// Nothing to write.
    Unchanged,
    /// Decisions computed, nothing written.
    DryRun,
}

impl UpdateStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Normalized => "normalized",
            Self::Unchanged => "unchanged",
            Self::DryRun => "dry-run",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub status: UpdateStatus,
    pub latest_before: YearMonth,
    pub window: FetchWindow,
    pub fetched_rows: usize,
    pub monthly_points: usize,
    pub merge: MergeOutcome,
    pub normalized: bool,
    pub table_sha_before: String,
    pub table_sha_after: String,
    pub daily_rows: Option<usize>,
}

impl UpdateOutcome {
    pub fn wrote_files(&self) -> bool {
        matches!(self.status, UpdateStatus::Applied | UpdateStatus::Normalized)
    }
}

/// One reconciliation run. Every fatal error is raised before the first
/// write; the daily series is computed in memory before either file is
/// replaced. The daily file is written first: if the table write then fails,
/// the table still differs from the remote and the next run rewrites both.
pub fn run_update(source: &dyn SeriesSource, req: &UpdateRequest) -> Result<UpdateOutcome> {
    let raw = fs::read(&req.table_file)
        .with_context(|| format!("missing CPI table {}", req.table_file.display()))?;
    let table_sha_before = sha256_hex(&raw);
    let loaded = MonthlyTable::from_reader(raw.as_slice())
        .with_context(|| format!("failed to load {}", req.table_file.display()))?;
    let normalized = loaded.normalized;
    let mut table = loaded.table;

    let analyzer = GapAnalyzer::new(&table);
    let latest_before = analyzer.latest_filled_month()?;
    let window = analyzer.fetch_window(req.lookback_years, req.end_year)?;
    log::debug!(
        "series={} window={}-{} resume={} holes={:?} mode={}",
        req.series_id,
        window.start_year,
        window.end_year,
        window.resume,
        window.hole_years,
        req.mode.label()
    );

    let (fetched_rows, points) = if window.is_up_to_date() {
        log::info!("table up to date (last={latest_before})");
        (0, Vec::new())
    } else {
        let rows = fetch_range(
            source,
            &req.series_id,
            window.start_year,
            window.end_year,
            &req.retry,
        )?;
        let points = extract_monthly_points(&rows);
        (rows.len(), points)
    };

    let merge = merge::apply(&mut table, &points, &window, req.mode);
    let table_bytes = table.to_csv_bytes()?;
    let table_sha_after = sha256_hex(&table_bytes);

    let mut outcome = UpdateOutcome {
        status: UpdateStatus::Unchanged,
        latest_before,
        window,
        fetched_rows,
        monthly_points: points.len(),
        merge,
        normalized,
        table_sha_before,
        table_sha_after,
        daily_rows: None,
    };

    if outcome.merge.is_empty() && !normalized {
        log::info!("no monthly changes (nothing to update)");
        return Ok(outcome);
    }

    let daily = densify_table(&table, req.today)?;
    outcome.daily_rows = Some(daily.len());

    if req.dry_run {
        outcome.status = UpdateStatus::DryRun;
        return Ok(outcome);
    }

    write_daily(&req.daily_file, &daily)?;
    log::info!("wrote {} ({} rows)", req.daily_file.display(), daily.len());
    table.save(&req.table_file)?;
    log::info!("wrote {}", req.table_file.display());

    outcome.status = if outcome.merge.is_empty() {
        UpdateStatus::Normalized
    } else {
        UpdateStatus::Applied
    };
    Ok(outcome)
}
