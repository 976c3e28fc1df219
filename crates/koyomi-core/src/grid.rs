use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate, Weekday};

use crate::datekey::DateKey;
use crate::event::PlacedEvent;

pub const DAYS_PER_WEEK: usize = 7;

/// Owned by its week; mutated in place by the placement and marking
/// passes, discarded wholesale on the next render.
#[derive(Debug, Clone)]
pub struct DayCell {
    pub key: DateKey,
    pub outside_month: bool,
    pub saturday: bool,
    pub sunday: bool,
    pub singles: Vec<PlacedEvent>,
    pub holiday: bool,
    pub holiday_label: Option<String>,
    pub today: bool,
    /// Rows of band content above this cell's single events; singles render
    /// below the last band covering the cell.
    pub push_down: usize,
}

impl DayCell {
    fn new(date: NaiveDate, outside_month: bool) -> Self {
        Self {
            key: DateKey::new(date),
            outside_month,
            saturday: date.weekday() == Weekday::Sat,
            sunday: date.weekday() == Weekday::Sun,
            singles: Vec::new(),
            holiday: false,
            holiday_label: None,
            today: false,
            push_down: 0,
        }
    }
}

/// Always exactly seven cells, Monday first.
#[derive(Debug, Clone)]
pub struct Week {
    pub cells: Vec<DayCell>,
}

impl Week {
    #[must_use]
    pub fn first_key(&self) -> Option<DateKey> {
        self.cells.first().map(|cell| cell.key)
    }

    #[must_use]
    pub fn last_key(&self) -> Option<DateKey> {
        self.cells.last().map(|cell| cell.key)
    }

    #[must_use]
    pub fn column_of(&self, key: DateKey) -> Option<usize> {
        self.cells.iter().position(|cell| cell.key == key)
    }

    #[must_use]
    pub fn contains(&self, key: DateKey) -> bool {
        match (self.first_key(), self.last_key()) {
            (Some(first), Some(last)) => first <= key && key <= last,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalendarGrid {
    pub year: i32,
    pub month0: u32,
    pub weeks: Vec<Week>,
}

impl CalendarGrid {
    /// Leading filler back to the preceding Monday, every day of the
    /// month, then trailing filler until the final week holds seven cells.
    pub fn build(year: i32, month0: u32) -> anyhow::Result<Self> {
        if month0 > 11 {
            return Err(anyhow!("month index out of range: {month0}"));
        }

        let first = NaiveDate::from_ymd_opt(year, month0 + 1, 1)
            .ok_or_else(|| anyhow!("invalid month: {year}-{}", month0 + 1))?;
        let last = last_day_of_month(year, month0)?;
        let start_offset = i64::from(first.weekday().num_days_from_monday());
        let mut cursor = first
            .checked_sub_signed(chrono::Duration::days(start_offset))
            .ok_or_else(|| anyhow!("grid start out of range for {year}-{}", month0 + 1))?;

        let mut weeks = Vec::new();
        let mut cells: Vec<DayCell> = Vec::with_capacity(DAYS_PER_WEEK);

        loop {
            let outside = cursor.year() != year || cursor.month0() != month0;
            cells.push(DayCell::new(cursor, outside));

            if cursor.weekday() == Weekday::Sun {
                weeks.push(Week {
                    cells: std::mem::take(&mut cells),
                });
                if cursor >= last {
                    break;
                }
            }

            cursor = cursor
                .succ_opt()
                .ok_or_else(|| anyhow!("grid cursor overflow past {cursor}"))?;
        }

        Ok(Self {
            year,
            month0,
            weeks,
        })
    }

    #[must_use]
    pub fn week_index_containing(&self, key: DateKey) -> Option<usize> {
        self.weeks.iter().position(|week| week.contains(key))
    }

    #[must_use]
    pub fn cell_mut(&mut self, key: DateKey) -> Option<&mut DayCell> {
        self.weeks
            .iter_mut()
            .find(|week| week.contains(key))
            .and_then(|week| week.cells.iter_mut().find(|cell| cell.key == key))
    }

    pub fn cells(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flat_map(|week| week.cells.iter())
    }

    /// Grid-order sequence the detail surface indexes into.
    pub fn placed_singles(&self) -> impl Iterator<Item = (&DayCell, &PlacedEvent)> {
        self.cells()
            .flat_map(|cell| cell.singles.iter().map(move |event| (cell, event)))
    }
}

pub fn first_day_of_month(year: i32, month0: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .ok_or_else(|| anyhow!("invalid month: {year}-{}", month0 + 1))
}

pub fn last_day_of_month(year: i32, month0: u32) -> anyhow::Result<NaiveDate> {
    let (next_year, next_month0) = if month0 == 11 {
        (year + 1, 0)
    } else {
        (year, month0 + 1)
    };
    first_day_of_month(next_year, next_month0)?
        .pred_opt()
        .with_context(|| format!("no last day for {year}-{}", month0 + 1))
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;

    use super::{CalendarGrid, DAYS_PER_WEEK, last_day_of_month};
    use crate::datekey::DateKey;

    fn cell_count(grid: &CalendarGrid) -> usize {
        grid.weeks.iter().map(|week| week.cells.len()).sum()
    }

    #[test]
    fn every_week_has_seven_cells_starting_monday() {
        for (year, month0) in [(2021, 1), (2025, 4), (2025, 11), (2024, 1), (2026, 2)] {
            let grid = CalendarGrid::build(year, month0).expect("grid builds");
            assert!(!grid.weeks.is_empty());
            for week in &grid.weeks {
                assert_eq!(week.cells.len(), DAYS_PER_WEEK);
                let first = week.first_key().expect("week has cells");
                assert_eq!(first.date().weekday(), chrono::Weekday::Mon);
            }
        }
    }

    #[test]
    fn in_month_cells_match_month_length() {
        for (year, month0) in [(2021, 1), (2025, 4), (2024, 1), (2025, 11)] {
            let grid = CalendarGrid::build(year, month0).expect("grid builds");
            let in_month: Vec<_> = grid.cells().filter(|cell| !cell.outside_month).collect();
            let days = last_day_of_month(year, month0).expect("month length").day() as usize;
            assert_eq!(in_month.len(), days);
            assert_eq!(in_month[0].key.date().day(), 1);
        }
    }

    #[test]
    fn month_starting_monday_has_no_leading_filler() {
        // February 2021 starts on a Monday and spans exactly four weeks.
        let grid = CalendarGrid::build(2021, 1).expect("grid builds");
        assert_eq!(grid.weeks.len(), 4);
        let first = grid.weeks[0].first_key().expect("first week");
        assert_eq!(first.to_string(), "2021-02-01");
        assert!(grid.cells().all(|cell| !cell.outside_month));
    }

    #[test]
    fn five_and_six_week_months_are_supported() {
        // September 2025: Monday start, 30 days, five weeks.
        let five = CalendarGrid::build(2025, 8).expect("grid builds");
        assert_eq!(five.weeks.len(), 5);

        // May 2021: Saturday start, 31 days, six weeks.
        let six = CalendarGrid::build(2021, 4).expect("grid builds");
        assert_eq!(six.weeks.len(), 6);
        assert_eq!(cell_count(&six), 42);
    }

    #[test]
    fn trailing_filler_completes_the_last_week() {
        let grid = CalendarGrid::build(2025, 4).expect("grid builds");
        assert_eq!(cell_count(&grid) % DAYS_PER_WEEK, 0);
        let last_week = grid.weeks.last().expect("last week");
        let trailing: Vec<_> = last_week
            .cells
            .iter()
            .filter(|cell| cell.outside_month)
            .collect();
        assert!(trailing.iter().all(|cell| cell.key.date().month0() == 5));
    }

    #[test]
    fn week_lookup_finds_filler_days_too() {
        let grid = CalendarGrid::build(2025, 4).expect("grid builds");
        // 2025-04-28 is a leading filler Monday in the May 2025 grid.
        let filler: DateKey = "2025-04-28".parse().expect("key parses");
        assert_eq!(grid.week_index_containing(filler), Some(0));
        let outside: DateKey = "2025-04-01".parse().expect("key parses");
        assert_eq!(grid.week_index_containing(outside), None);
    }

    #[test]
    fn weekend_flags_follow_columns() {
        let grid = CalendarGrid::build(2025, 4).expect("grid builds");
        for week in &grid.weeks {
            assert!(week.cells[5].saturday);
            assert!(week.cells[6].sunday);
            assert!(week.cells[0..5].iter().all(|c| !c.saturday && !c.sunday));
        }
    }
}
