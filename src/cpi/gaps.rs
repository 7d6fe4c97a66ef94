use crate::cpi::table::{MonthlyTable, YearMonth};
use crate::error::CpiError;
use std::collections::BTreeSet;

/// Read-only queries over a monthly table that decide what to fetch next.
pub struct GapAnalyzer<'a> {
    table: &'a MonthlyTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    pub start_year: i32,
    pub end_year: i32,
    /// Month the frontier resumes at; holes in the latest year take priority.
    pub resume: YearMonth,
    pub hole_years: BTreeSet<i32>,
}

impl FetchWindow {
    pub fn is_up_to_date(&self) -> bool {
        self.start_year > self.end_year
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }
}

impl<'a> GapAnalyzer<'a> {
    pub fn new(table: &'a MonthlyTable) -> Self {
        Self { table }
    }

    pub fn latest_filled_month(&self) -> Result<YearMonth, CpiError> {
        self.table
            .rows()
            .iter()
            .rev()
            .find_map(|row| row.last_numeric_month().map(|m| YearMonth::new(row.year, m)))
            .ok_or(CpiError::EmptyTable)
    }

    pub fn update_window_start(&self) -> Result<YearMonth, CpiError> {
        let max_year = self.table.max_year().ok_or(CpiError::EmptyTable)?;
        let Some(row) = self.table.row(max_year) else {
            return Err(CpiError::EmptyTable);
        };
        let Some(last_numeric) = row.last_numeric_month() else {
            return Ok(YearMonth::new(max_year, 1));
        };

        if let Some((hole, _)) = row
            .months()
            .take(last_numeric as usize)
            .find(|(_, cell)| cell.is_none())
        {
            return Ok(YearMonth::new(max_year, hole));
        }

        if last_numeric < 12 {
            return Ok(YearMonth::new(max_year, last_numeric + 1));
        }
        Ok(YearMonth::new(max_year + 1, 1))
    }

    /// Years holding an absent month that precedes the latest filled month.
    pub fn hole_years(&self) -> BTreeSet<i32> {
        let Ok(latest) = self.latest_filled_month() else {
            return BTreeSet::new();
        };
        self.table
            .rows()
            .iter()
            .filter(|row| {
                row.months().any(|(month, cell)| {
                    cell.is_none() && YearMonth::new(row.year, month) < latest
                })
            })
            .map(|row| row.year)
            .collect()
    }

    pub fn earliest_hole(&self) -> Option<YearMonth> {
        let latest = self.latest_filled_month().ok()?;
        self.table.rows().iter().find_map(|row| {
            row.months()
                .map(|(month, cell)| (YearMonth::new(row.year, month), cell))
                .find(|(ym, cell)| cell.is_none() && *ym < latest)
                .map(|(ym, _)| ym)
        })
    }

    /// The inclusive year range to reconcile: from the resume point, widened
    /// back by `lookback_years` (revisions) and to the earliest year with a hole.
    pub fn fetch_window(&self, lookback_years: u32, end_year: i32) -> Result<FetchWindow, CpiError> {
        let resume = self.update_window_start()?;
        let (Some(min_year), Some(max_year)) = (self.table.min_year(), self.table.max_year())
        else {
            return Err(CpiError::EmptyTable);
        };

        let lookback = i32::try_from(lookback_years).unwrap_or(i32::MAX);
        let revision_start = min_year.max(max_year.saturating_sub(lookback));
        let hole_years = self.hole_years();

        let mut start_year = resume.year.min(revision_start);
        if let Some(first_hole_year) = hole_years.first() {
            start_year = start_year.min(*first_hole_year);
        }

        Ok(FetchWindow {
            start_year,
            end_year,
            resume,
            hole_years,
        })
    }
}
