use tracing::trace;

use crate::datekey::DateKey;
use crate::event::SourceEvent;
use crate::grid::CalendarGrid;

pub const TODAY_LABEL: &str = "本日";

/// Attaches each holiday's label exactly once; running the pass again over
/// the same grid changes nothing.
pub fn mark_holidays(grid: &mut CalendarGrid, holidays: &[SourceEvent]) {
    for holiday in holidays {
        let Some(key) = holiday
            .start
            .as_ref()
            .and_then(|stamp| stamp.date)
            .map(DateKey::new)
        else {
            trace!(title = %holiday.summary, "holiday without date-only start; skipping");
            continue;
        };

        let Some(cell) = grid.cell_mut(key) else {
            trace!(title = %holiday.summary, key = %key, "holiday outside grid; skipping");
            continue;
        };

        cell.holiday = true;
        if cell.holiday_label.is_none() {
            cell.holiday_label = Some(holiday.summary.clone());
        }
    }
}

/// Independent of holiday marking; both may land on the same cell.
pub fn mark_today(grid: &mut CalendarGrid, today: DateKey) {
    if let Some(cell) = grid.cell_mut(today) {
        cell.today = true;
    }
}

#[cfg(test)]
mod tests {
    use super::{mark_holidays, mark_today};
    use crate::event::SourceEvent;
    use crate::grid::CalendarGrid;

    fn holiday(title: &str, date: &str) -> SourceEvent {
        serde_json::from_value(serde_json::json!({
            "summary": title,
            "start": { "date": date },
            "end": { "date": date },
        }))
        .expect("valid holiday json")
    }

    #[test]
    fn marking_twice_does_not_duplicate_labels() {
        let mut grid = CalendarGrid::build(2025, 4).expect("grid builds");
        let holidays = vec![holiday("こどもの日", "2025-05-05")];

        mark_holidays(&mut grid, &holidays);
        mark_holidays(&mut grid, &holidays);

        let cell = grid.cell_mut("2025-05-05".parse().expect("key")).expect("cell");
        assert!(cell.holiday);
        assert_eq!(cell.holiday_label.as_deref(), Some("こどもの日"));
    }

    #[test]
    fn first_label_wins_on_colliding_holidays() {
        let mut grid = CalendarGrid::build(2025, 4).expect("grid builds");
        let holidays = vec![
            holiday("こどもの日", "2025-05-05"),
            holiday("振替休日", "2025-05-05"),
        ];
        mark_holidays(&mut grid, &holidays);

        let cell = grid.cell_mut("2025-05-05".parse().expect("key")).expect("cell");
        assert_eq!(cell.holiday_label.as_deref(), Some("こどもの日"));
    }

    #[test]
    fn holiday_and_today_coexist() {
        let mut grid = CalendarGrid::build(2025, 4).expect("grid builds");
        mark_holidays(&mut grid, &[holiday("こどもの日", "2025-05-05")]);
        mark_today(&mut grid, "2025-05-05".parse().expect("key"));

        let cell = grid.cell_mut("2025-05-05".parse().expect("key")).expect("cell");
        assert!(cell.holiday);
        assert!(cell.today);
    }

    #[test]
    fn out_of_month_holiday_is_skipped() {
        let mut grid = CalendarGrid::build(2025, 4).expect("grid builds");
        mark_holidays(&mut grid, &[holiday("海の日", "2025-07-21")]);
        assert!(grid.cells().all(|cell| !cell.holiday));
    }

    #[test]
    fn today_outside_grid_marks_nothing() {
        let mut grid = CalendarGrid::build(2025, 4).expect("grid builds");
        mark_today(&mut grid, "2025-12-25".parse().expect("key"));
        assert!(grid.cells().all(|cell| !cell.today));
    }
}
