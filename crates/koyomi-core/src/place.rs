use tracing::{debug, trace};

use crate::band::{self, MultiDayBand};
use crate::config::Config;
use crate::event::{EventSpan, PlacedEvent, SourceEvent, TimeBand};
use crate::grid::{CalendarGrid, DayCell};

/// Feed order in, Midday → Evening → Night out. Midday goes before the
/// first non-Midday event, Evening before the first Night, Night at the
/// end; ties within a category keep arrival order.
pub fn insert_single(cell: &mut DayCell, placed: PlacedEvent) {
    let position = match placed.band {
        TimeBand::Midday => cell
            .singles
            .iter()
            .position(|existing| existing.band != TimeBand::Midday),
        TimeBand::Evening => cell
            .singles
            .iter()
            .position(|existing| existing.band == TimeBand::Night),
        TimeBand::Night => None,
    };

    match position {
        Some(index) => cell.singles.insert(index, placed),
        None => cell.singles.push(placed),
    }
}

pub fn classify(event: &SourceEvent, cfg: &Config) -> PlacedEvent {
    let band = TimeBand::classify(&event.summary, &cfg.keywords);

    let mut thumbnails = Vec::new();
    if let Some(description) = &event.description {
        let lowered = description.to_lowercase();
        for thumb in &cfg.thumbs {
            if lowered.contains(&thumb.keyword) {
                thumbnails.push(thumb.url.clone());
            }
        }
    }

    PlacedEvent {
        event: event.clone(),
        band,
        thumbnails,
    }
}

/// One placement pass over a freshly built grid: single-day events go into
/// their cells, spanning events become week bands.
pub fn populate_grid(
    grid: &mut CalendarGrid,
    events: &[SourceEvent],
    cfg: &Config,
) -> Vec<MultiDayBand> {
    let mut bands = Vec::new();

    for event in events {
        let Some(span) = EventSpan::resolve(event) else {
            continue;
        };

        if span.is_single_day() {
            let placed = classify(event, cfg);
            match grid.cell_mut(span.start) {
                Some(cell) => insert_single(cell, placed),
                None => {
                    trace!(title = %event.summary, key = %span.start, "no cell for event; skipping");
                }
            }
        } else {
            let band = band::lay_out(grid, event, span, &cfg.palette);
            if band.segments.is_empty() {
                trace!(title = %event.summary, "span outside rendered grid; skipping");
                continue;
            }
            band::push_down_singles(grid, &band);
            bands.push(band);
        }
    }

    debug!(
        singles = grid.cells().map(|cell| cell.singles.len()).sum::<usize>(),
        bands = bands.len(),
        "populated grid"
    );
    bands
}
