//! Monthly -> daily densification.
//!
//! Every numeric month contributes a point on its first day. Points are
//! extended past the last publication with the last month-over-month delta,
//! joined by straight lines day by day, and turned into day-over-day
//! multipliers. Absent months simply have no point, so the line between the
//! surrounding months bridges them.

use crate::cpi::table::MonthlyTable;
use crate::cpi::util::write_atomic;
use crate::error::CpiError;
use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate};
use std::collections::BTreeMap;
use std::path::Path;

pub const DAILY_HEADER: [&str; 3] = ["timestamp", "CPI", "daily_multiplicator"];
pub const VALUE_DECIMALS: i32 = 4;
pub const MULTIPLIER_DECIMALS: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub multiplier: f64,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn next_month_start(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Exclusive end of the daily series: the day after `today`.
pub fn cutoff_for(today: NaiveDate) -> NaiveDate {
    today.checked_add_days(Days::new(1)).unwrap_or(today)
}

/// `(month_start, value)` for every numeric month, ascending.
pub fn monthly_points(table: &MonthlyTable) -> Vec<(NaiveDate, f64)> {
    let mut points: Vec<(NaiveDate, f64)> = table
        .rows()
        .iter()
        .flat_map(|row| {
            row.months().filter_map(move |(month, cell)| {
                let cell = cell?;
                let date = NaiveDate::from_ymd_opt(row.year, month, 1)?;
                Some((date, cell.value()))
            })
        })
        .collect();
    points.sort_by_key(|(date, _)| *date);
    points
}

/// Appends synthetic month starts before `cutoff`, each one step of the
/// delta between the two most recent known points.
pub fn extend_with_trend(points: &mut Vec<(NaiveDate, f64)>, cutoff: NaiveDate) {
    let Some(&(mut last_date, mut last_value)) = points.last() else {
        return;
    };
    let prev_value = points
        .len()
        .checked_sub(2)
        .map(|idx| points[idx].1)
        .unwrap_or(last_value);
    let delta = last_value - prev_value;

    while let Some(next) = next_month_start(last_date).filter(|next| *next < cutoff) {
        last_value += delta;
        last_date = next;
        points.push((last_date, last_value));
    }
}

/// One value per day in `[d0, d1)`; nothing when `d1 <= d0`.
pub fn interpolate_pair(d0: NaiveDate, v0: f64, d1: NaiveDate, v1: f64) -> Vec<(NaiveDate, f64)> {
    let days = (d1 - d0).num_days();
    if days <= 0 {
        return Vec::new();
    }
    let step = (v1 - v0) / days as f64;
    (0..days)
        .filter_map(|i| {
            let date = d0.checked_add_days(Days::new(i as u64))?;
            Some((date, v0 + i as f64 * step))
        })
        .collect()
}

/// Builds the daily series for the known monthly `points` as of `today`.
pub fn densify(mut points: Vec<(NaiveDate, f64)>, today: NaiveDate) -> Result<Vec<DailyPoint>, CpiError> {
    if points.is_empty() {
        return Err(CpiError::EmptyTable);
    }
    let cutoff = cutoff_for(today);
    extend_with_trend(&mut points, cutoff);

    // last write wins on a repeated date
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for pair in points.windows(2) {
        let ((d0, v0), (d1, v1)) = (pair[0], pair[1]);
        by_date.extend(interpolate_pair(d0, v0, d1, v1));
    }
    by_date.retain(|date, _| *date < cutoff);

    let mut out: Vec<DailyPoint> = Vec::with_capacity(by_date.len());
    for (date, raw) in by_date {
        let value = round_to(raw, VALUE_DECIMALS);
        let multiplier = match out.last() {
            None => 1.0,
            Some(prev) if prev.value == 0.0 => {
                return Err(CpiError::ZeroBaseline {
                    date: date.format("%Y-%m-%d").to_string(),
                });
            }
            Some(prev) => value / prev.value,
        };
        out.push(DailyPoint {
            date,
            value,
            multiplier,
        });
    }
    Ok(out)
}

pub fn densify_table(table: &MonthlyTable, today: NaiveDate) -> Result<Vec<DailyPoint>, CpiError> {
    densify(monthly_points(table), today)
}

pub fn daily_csv_bytes(points: &[DailyPoint]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(Vec::new());
    wtr.write_record(DAILY_HEADER)?;
    for point in points {
        wtr.write_record([
            point.date.format("%Y-%m-%d").to_string(),
            format!("{:.*}", VALUE_DECIMALS as usize, point.value),
            format!(
                "{:.*}",
                MULTIPLIER_DECIMALS as usize,
                round_to(point.multiplier, MULTIPLIER_DECIMALS)
            ),
        ])?;
    }
    wtr.into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush daily series: {err}"))
}

pub fn write_daily(path: &Path, points: &[DailyPoint]) -> Result<()> {
    let bytes = daily_csv_bytes(points)?;
    write_atomic(path, &bytes)
}
