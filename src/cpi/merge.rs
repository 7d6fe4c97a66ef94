use crate::cpi::gaps::FetchWindow;
use crate::cpi::remote::MonthlyObservation;
use crate::cpi::table::MonthlyTable;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Only absent cells are written.
    FillOnly,
    /// Absent cells are written; numeric cells are replaced when the incoming
    /// value differs numerically.
    Overwrite,
}

impl MergeMode {
    pub fn from_overwrite(overwrite_existing: bool) -> Self {
        if overwrite_existing {
            Self::Overwrite
        } else {
            Self::FillOnly
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::FillOnly => "fill-only",
            Self::Overwrite => "overwrite",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub touched_years: BTreeSet<i32>,
    pub changed_cells: usize,
    pub out_of_window: usize,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        self.changed_cells == 0
    }
}

fn should_write(current: Option<f64>, incoming: f64, mode: MergeMode) -> bool {
    match (current, mode) {
        (None, _) => true,
        // Compare numbers, not text: "308.40" and "308.4" are the same value.
        (Some(cur), MergeMode::Overwrite) => cur != incoming,
        (Some(_), MergeMode::FillOnly) => false,
    }
}

/// Applies remote observations to `table`. Observations outside `window` are
/// counted and ignored. Half-year aggregates are recomputed for touched years
/// only.
pub fn apply(
    table: &mut MonthlyTable,
    points: &[MonthlyObservation],
    window: &FetchWindow,
    mode: MergeMode,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for point in points {
        if !window.contains(point.year) {
            outcome.out_of_window += 1;
            continue;
        }

        let current = table.ensure_year(point.year).month(point.month).map(|c| c.value());
        if !should_write(current, point.cell.value(), mode) {
            continue;
        }

        log::debug!(
            "write {}-{:02}: {:?} -> {}",
            point.year,
            point.month,
            current,
            point.cell.text()
        );
        table.set_month(point.year, point.month, point.cell.clone());
        outcome.touched_years.insert(point.year);
        outcome.changed_cells += 1;
    }

    for year in &outcome.touched_years {
        table.recompute_half_years(*year);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpi::table::{Cell, YearMonth};

    const HEADER: &str = "Year,Jan,Feb,Mar,Apr,May,Jun,Jul,Aug,Sep,Oct,Nov,Dec,HALF1,HALF2\n";

    fn table(body: &str) -> MonthlyTable {
        MonthlyTable::from_reader(format!("{HEADER}{body}").as_bytes())
            .expect("load")
            .table
    }

    fn window(start_year: i32, end_year: i32) -> FetchWindow {
        FetchWindow {
            start_year,
            end_year,
            resume: YearMonth::new(start_year, 1),
            hole_years: BTreeSet::new(),
        }
    }

    fn obs(year: i32, month: u32, value: &str) -> MonthlyObservation {
        MonthlyObservation {
            year,
            month,
            cell: Cell::parse(value).expect("numeric"),
        }
    }

    #[test]
    fn fill_only_never_replaces_numeric_cells() {
        let mut t = table("2024,100.5,,,,,,,,,,,,,\n");
        let out = apply(&mut t, &[obs(2024, 1, "100.6")], &window(2024, 2024), MergeMode::FillOnly);
        assert!(out.is_empty());
        assert_eq!(t.month(2024, 1).map(Cell::text), Some("100.5"));
    }

    #[test]
    fn overwrite_replaces_and_recomputes_half_year() {
        let mut t = table("2024,100.5,101,102,103,104,105,,,,,,,101.500,\n");
        let out = apply(&mut t, &[obs(2024, 1, "100.6")], &window(2024, 2024), MergeMode::Overwrite);
        assert_eq!(out.changed_cells, 1);
        assert_eq!(t.month(2024, 1).map(Cell::text), Some("100.6"));
        let half = t.row(2024).and_then(|r| r.half(0)).map(Cell::text);
        assert_eq!(half, Some("102.600"));
    }

    #[test]
    fn numerically_equal_text_does_not_write() {
        let mut t = table("2024,308.40,,,,,,,,,,,,,\n");
        let out = apply(&mut t, &[obs(2024, 1, "308.4")], &window(2024, 2024), MergeMode::Overwrite);
        assert!(out.is_empty());
        assert_eq!(t.month(2024, 1).map(Cell::text), Some("308.40"));
    }

    #[test]
    fn absent_cells_are_always_filled() {
        let mut t = table("2024,90,,91,,,,,,,,,,,\n");
        let out = apply(
            &mut t,
            &[obs(2024, 2, "90.5"), obs(2024, 4, "92")],
            &window(2024, 2024),
            MergeMode::FillOnly,
        );
        assert_eq!(out.changed_cells, 2);
        assert_eq!(out.touched_years, BTreeSet::from([2024]));
        assert_eq!(t.month(2024, 2).map(Cell::value), Some(90.5));
    }

    #[test]
    fn new_years_are_inserted_in_order() {
        let mut t = table("2023,1,,,,,,,,,,,,,\n");
        apply(
            &mut t,
            &[obs(2025, 1, "3"), obs(2024, 1, "2")],
            &window(2023, 2025),
            MergeMode::Overwrite,
        );
        let years: Vec<i32> = t.rows().iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2023, 2024, 2025]);
    }

    #[test]
    fn observations_outside_window_are_ignored() {
        let mut t = table("2023,1,,,,,,,,,,,,,\n");
        let out = apply(
            &mut t,
            &[obs(1999, 1, "3"), obs(2031, 1, "2")],
            &window(2023, 2030),
            MergeMode::Overwrite,
        );
        assert_eq!(out.out_of_window, 2);
        assert!(out.is_empty());
        assert_eq!(t.rows().len(), 1);
    }

    #[test]
    fn untouched_years_keep_their_aggregates() {
        let mut t = table("2022,1,1,1,1,1,1,,,,,,,0.999,\n2023,,,,,,,,,,,,,,\n");
        apply(&mut t, &[obs(2023, 1, "5")], &window(2022, 2023), MergeMode::Overwrite);
        let half = t.row(2022).and_then(|r| r.half(0)).map(Cell::text);
        assert_eq!(half, Some("0.999"));
    }
}
