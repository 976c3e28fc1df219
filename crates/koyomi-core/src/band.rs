use tracing::trace;

use crate::config::PaletteRules;
use crate::event::{EventSpan, SourceEvent, band_palette_code};
use crate::grid::CalendarGrid;

/// The portion of a multi-day event visible within one week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandSegment {
    pub week: usize,
    pub start_col: usize,
    pub end_col: usize,
    /// Only the first segment of an event carries the title; later weeks
    /// render a continuation band with an empty label.
    pub first: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiDayBand {
    pub title: String,
    pub code: String,
    pub segments: Vec<BandSegment>,
}

/// Walks the span week by week, clamping the visible sub-range to each
/// week, until the cursor leaves the span or the rendered grid.
pub fn lay_out(
    grid: &CalendarGrid,
    event: &SourceEvent,
    span: EventSpan,
    palette: &PaletteRules,
) -> MultiDayBand {
    let mut segments = Vec::new();
    let mut cursor = span.start;
    let mut first = true;

    while cursor <= span.end {
        let Some(week_index) = grid.week_index_containing(cursor) else {
            break;
        };
        let week = &grid.weeks[week_index];
        let (Some(week_first), Some(week_last)) = (week.first_key(), week.last_key()) else {
            break;
        };

        let display_start = cursor.max(week_first);
        let display_end = span.end.min(week_last);

        match (week.column_of(display_start), week.column_of(display_end)) {
            (Some(start_col), Some(end_col)) => {
                segments.push(BandSegment {
                    week: week_index,
                    start_col,
                    end_col,
                    first,
                });
                first = false;
            }
            _ => {
                trace!(
                    title = %event.summary,
                    week = week_index,
                    "band bounds unresolved in week; segment skipped"
                );
            }
        }

        match week_last.succ() {
            Ok(next) => cursor = next,
            Err(_) => break,
        }
    }

    MultiDayBand {
        title: event.summary.clone(),
        code: band_palette_code(&event.summary, palette),
        segments,
    }
}

/// Each affected cell's singles start below the last band row covering it.
pub fn push_down_singles(grid: &mut CalendarGrid, band: &MultiDayBand) {
    for segment in &band.segments {
        let Some(week) = grid.weeks.get_mut(segment.week) else {
            continue;
        };
        let row = week
            .cells
            .iter()
            .map(|cell| cell.push_down)
            .max()
            .unwrap_or(0);
        for col in segment.start_col..=segment.end_col {
            if let Some(cell) = week.cells.get_mut(col) {
                cell.push_down = cell.push_down.max(row + 1);
            }
        }
    }
}

/// Left offset = sum of preceding column widths; width = sum of covered
/// column widths minus the trailing inset. Pure over the width list so it
/// can be fed character widths or measured pixels.
#[must_use]
pub fn segment_geometry(
    widths: &[usize],
    start_col: usize,
    end_col: usize,
    trailing_inset: usize,
) -> (usize, usize) {
    let left = widths.iter().take(start_col).sum::<usize>();
    let covered = widths
        .iter()
        .skip(start_col)
        .take(end_col.saturating_sub(start_col) + 1)
        .sum::<usize>();
    (left, covered.saturating_sub(trailing_inset))
}

/// Bands stack within a week in arrival order, one row each.
#[must_use]
pub fn segments_for_week(bands: &[MultiDayBand], week: usize) -> Vec<(&MultiDayBand, &BandSegment)> {
    bands
        .iter()
        .flat_map(|band| {
            band.segments
                .iter()
                .filter(move |segment| segment.week == week)
                .map(move |segment| (band, segment))
        })
        .collect()
}
