use crate::cpi::util::write_atomic;
use crate::error::CpiError;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

pub const YEAR_COLUMN: &str = "Year";
pub const MONTH_COLUMNS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
pub const HALF_COLUMNS: [&str; 2] = ["HALF1", "HALF2"];

/// A numeric cell. The source text is kept so an untouched cell is written
/// back exactly as it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    text: String,
    value: f64,
}

impl Cell {
    /// Parses stored text. Empty, placeholder or non-finite text yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let value = trimmed.parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some(Self {
            text: trimmed.to_string(),
            value,
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn half_year_mean(value: f64) -> Self {
        Self {
            text: format!("{value:.3}"),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearRow {
    pub year: i32,
    months: [Option<Cell>; 12],
    halves: [Option<Cell>; 2],
}

impl YearRow {
    pub fn empty(year: i32) -> Self {
        Self {
            year,
            months: std::array::from_fn(|_| None),
            halves: [None, None],
        }
    }

    /// `month` is 1-based.
    pub fn month(&self, month: u32) -> Option<&Cell> {
        let idx = month.checked_sub(1)? as usize;
        self.months.get(idx)?.as_ref()
    }

    pub fn half(&self, half: usize) -> Option<&Cell> {
        self.halves.get(half)?.as_ref()
    }

    pub fn months(&self) -> impl DoubleEndedIterator<Item = (u32, Option<&Cell>)> {
        self.months
            .iter()
            .enumerate()
            .map(|(idx, cell)| (idx as u32 + 1, cell.as_ref()))
    }

    pub fn last_numeric_month(&self) -> Option<u32> {
        self.months()
            .rev()
            .find(|(_, cell)| cell.is_some())
            .map(|(month, _)| month)
    }

    fn recompute_halves(&mut self) {
        for (half, block) in self.months.chunks(6).enumerate() {
            let values: Option<Vec<f64>> = block.iter().map(|c| c.as_ref().map(Cell::value)).collect();
            self.halves[half] = values.map(|vals| {
                let mean = vals.iter().sum::<f64>() / vals.len() as f64;
                Cell::half_year_mean(mean)
            });
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyTable {
    rows: Vec<YearRow>,
}

#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: MonthlyTable,
    /// True when placeholders or duplicate rows were dropped while loading.
    pub normalized: bool,
}

fn normalize_cell(raw: Option<&str>, normalized: &mut bool) -> Option<Cell> {
    let raw = raw.unwrap_or("");
    let cell = Cell::parse(raw);
    if cell.is_none() && !raw.is_empty() {
        *normalized = true;
    }
    cell
}

impl MonthlyTable {
    pub fn load(path: &Path) -> Result<LoadedTable> {
        let file =
            fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<LoadedTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);

        let year_idx = column(YEAR_COLUMN).ok_or_else(|| CpiError::Schema {
            column: YEAR_COLUMN.to_string(),
        })?;
        let month_idx = MONTH_COLUMNS.map(column);
        let half_idx = HALF_COLUMNS.map(column);

        let mut normalized = false;
        let mut by_year: BTreeMap<i32, YearRow> = BTreeMap::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let raw_year = record.get(year_idx).unwrap_or("").trim();
            let Ok(year) = raw_year.parse::<i32>() else {
                log::debug!("dropping row {} with unparseable year `{raw_year}`", line + 2);
                continue;
            };
            if by_year.contains_key(&year) {
                log::warn!("dropping duplicate row for year {year}");
                normalized = true;
                continue;
            }

            let mut row = YearRow::empty(year);
            for (slot, idx) in row.months.iter_mut().zip(month_idx) {
                *slot = normalize_cell(idx.and_then(|i| record.get(i)), &mut normalized);
            }
            for (slot, idx) in row.halves.iter_mut().zip(half_idx) {
                *slot = normalize_cell(idx.and_then(|i| record.get(i)), &mut normalized);
            }
            by_year.insert(year, row);
        }

        Ok(LoadedTable {
            table: Self {
                rows: by_year.into_values().collect(),
            },
            normalized,
        })
    }

    pub fn rows(&self) -> &[YearRow] {
        &self.rows
    }

    pub fn min_year(&self) -> Option<i32> {
        self.rows.first().map(|r| r.year)
    }

    pub fn max_year(&self) -> Option<i32> {
        self.rows.last().map(|r| r.year)
    }

    pub fn row(&self, year: i32) -> Option<&YearRow> {
        self.rows
            .binary_search_by_key(&year, |r| r.year)
            .ok()
            .map(|idx| &self.rows[idx])
    }

    pub fn month(&self, year: i32, month: u32) -> Option<&Cell> {
        self.row(year)?.month(month)
    }

    /// Returns the row for `year`, inserting an all-absent row in sorted
    /// position when it does not exist yet.
    pub fn ensure_year(&mut self, year: i32) -> &mut YearRow {
        let idx = match self.rows.binary_search_by_key(&year, |r| r.year) {
            Ok(idx) => idx,
            Err(idx) => {
                self.rows.insert(idx, YearRow::empty(year));
                idx
            }
        };
        &mut self.rows[idx]
    }

    /// Writes a month cell. Half-year aggregates are left alone until
    /// `recompute_half_years` is called for the year.
    pub fn set_month(&mut self, year: i32, month: u32, cell: Cell) {
        let Some(idx) = month.checked_sub(1).map(|m| m as usize).filter(|m| *m < 12) else {
            return;
        };
        self.ensure_year(year).months[idx] = Some(cell);
    }

    pub fn recompute_half_years(&mut self, year: i32) {
        if let Ok(idx) = self.rows.binary_search_by_key(&year, |r| r.year) {
            self.rows[idx].recompute_halves();
        }
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        let mut header = vec![YEAR_COLUMN];
        header.extend(MONTH_COLUMNS);
        header.extend(HALF_COLUMNS);
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(row.year.to_string());
            for cell in row.months.iter().chain(row.halves.iter()) {
                record.push(cell.as_ref().map(|c| c.text().to_string()).unwrap_or_default());
            }
            wtr.write_record(&record)?;
        }

        wtr.into_inner()
            .map_err(|err| anyhow::anyhow!("failed to flush monthly table: {err}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_csv_bytes()?)
    }
}
