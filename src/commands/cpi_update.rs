use anyhow::Result;
use chrono::{Datelike, NaiveDate, Utc};
use std::path::PathBuf;

use crate::bls::client::BlsClient;
use crate::commands::{CommandReport, format_years};
use crate::cpi::audit;
use crate::cpi::config::load_config;
use crate::cpi::merge::MergeMode;
use crate::cpi::paths::resolve_paths;
use crate::cpi::update::{UpdateOutcome, UpdateRequest, UpdateStatus, run_update};
use crate::cpi::util::today_in;
use crate::cpi::warn;
use crate::error::CpiError;

#[derive(Debug, Clone, Default)]
pub struct CpiUpdateOptions {
    pub series_id: Option<String>,
    pub table: Option<PathBuf>,
    pub daily: Option<PathBuf>,
    pub end_year: Option<i32>,
    pub lookback_years: Option<u32>,
    pub no_overwrite: bool,
    pub dry_run: bool,
    pub as_of: Option<NaiveDate>,
}

fn describe(report: &mut CommandReport, out: &UpdateOutcome, dry_run: bool) {
    let window = &out.window;
    report.detail(format!("latest_before={}", out.latest_before));
    report.detail(format!("window={}-{}", window.start_year, window.end_year));
    report.detail(format!("resume={}", window.resume));
    report.detail(format!("hole_years={}", format_years(&window.hole_years)));
    report.detail(format!("fetched_rows={}", out.fetched_rows));
    report.detail(format!("monthly_points={}", out.monthly_points));
    report.detail(format!("out_of_window={}", out.merge.out_of_window));
    report.detail(format!("changed_cells={}", out.merge.changed_cells));
    report.detail(format!("touched_years={}", format_years(&out.merge.touched_years)));
    report.detail(format!("normalized={}", out.normalized));
    report.detail(format!("table_sha256_before={}", out.table_sha_before));
    report.detail(format!("table_sha256_after={}", out.table_sha_after));
    if let Some(rows) = out.daily_rows {
        report.detail(format!("daily_rows={rows}"));
    }
    report.detail(format!("status={}", out.status.label()));

    if dry_run && out.status == UpdateStatus::DryRun {
        let extra = if out.normalized {
            " + normalize placeholders"
        } else {
            ""
        };
        report.detail(format!(
            "dry-run: would update years={} changed_cells={}{extra}",
            format_years(&out.merge.touched_years),
            out.merge.changed_cells
        ));
    }
}

pub fn run(opts: &CpiUpdateOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths();
    let mut report = CommandReport::new("update");

    let series_id = opts
        .series_id
        .clone()
        .unwrap_or_else(|| cfg.series.series_id.clone());
    let overwrite = cfg.series.overwrite_existing && !opts.no_overwrite;
    let tz = cfg.timezone()?;
    let req = UpdateRequest {
        series_id: series_id.clone(),
        table_file: opts.table.clone().unwrap_or(paths.table_file),
        daily_file: opts.daily.clone().unwrap_or(paths.daily_file),
        end_year: opts.end_year.unwrap_or_else(|| Utc::now().year()),
        lookback_years: opts.lookback_years.unwrap_or(cfg.series.lookback_years),
        mode: MergeMode::from_overwrite(overwrite),
        dry_run: opts.dry_run,
        today: opts.as_of.unwrap_or_else(|| today_in(tz)),
        retry: cfg.retry_policy(),
    };

    report.detail(format!("series_id={series_id}"));
    report.detail(format!("table={}", req.table_file.display()));
    report.detail(format!("daily={}", req.daily_file.display()));
    report.detail(format!("mode={}", req.mode.label()));
    report.detail(format!("lookback_years={}", req.lookback_years));
    report.detail(format!("today={}", req.today));
    if opts.dry_run {
        report.detail("update.dry_run=true".to_string());
    }

    let client = BlsClient::new(
        &cfg.remote.url,
        cfg.remote.registration_key.clone(),
        cfg.request_timeout(),
    )?;

    match run_update(&client, &req) {
        Ok(out) => {
            describe(&mut report, &out, opts.dry_run);
            if out.wrote_files() {
                audit::append_event(
                    &paths.logs_dir,
                    "update",
                    out.status.label(),
                    &format!(
                        "series={series_id} changed_cells={} touched_years={}",
                        out.merge.changed_cells,
                        format_years(&out.merge.touched_years)
                    ),
                )?;
            }
            Ok(report)
        }
        Err(err) => {
            let code = err
                .downcast_ref::<CpiError>()
                .map(|cpi| cpi.code().as_str())
                .unwrap_or("E000_UNEXPECTED");
            warn::emit(
                code,
                "update",
                "abort",
                &series_id,
                &format!("end_year={}", req.end_year),
                "no",
                "run aborted; monthly table left unchanged",
                &format!("{err:#}"),
            );
            if !opts.dry_run {
                if let Err(audit_err) =
                    audit::append_event(&paths.logs_dir, "update", "failed", &format!("{err:#}"))
                {
                    log::debug!("failed to record update failure in audit log: {audit_err:#}");
                }
            }
            Err(err)
        }
    }
}
