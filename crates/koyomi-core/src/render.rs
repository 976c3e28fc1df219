use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Datelike;
use unicode_width::UnicodeWidthChar;

use crate::band::{BandSegment, MultiDayBand, segment_geometry, segments_for_week};
use crate::config::RenderRules;
use crate::content::{ContentNode, format_description};
use crate::event::PlacedEvent;
use crate::grid::{CalendarGrid, DAYS_PER_WEEK, Week};
use crate::mark::TODAY_LABEL;

const WEEKDAY_LABELS: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

const CODE_SATURDAY: &str = "34";
const CODE_SUNDAY: &str = "31";
const CODE_OUTSIDE: &str = "90";
const CODE_NOTICE: &str = "31";
const CODE_LINK: &str = "4;34";
const CODE_IMAGE: &str = "36";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    column_width: usize,
    band_inset: usize,
}

impl Renderer {
    pub fn new(rules: &RenderRules) -> anyhow::Result<Self> {
        let color = match rules.color.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color,
            column_width: rules.column_width,
            band_inset: rules.band_inset,
        })
    }

    #[tracing::instrument(skip_all)]
    pub fn print_month(
        &mut self,
        grid: &CalendarGrid,
        bands: &[MultiDayBand],
        notice: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_month(&mut out, grid, bands, notice)
    }

    #[tracing::instrument(skip_all)]
    pub fn print_event_detail(&mut self, event: &PlacedEvent) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_event_detail(&mut out, event)
    }

    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        grid: &CalendarGrid,
        bands: &[MultiDayBand],
        notice: Option<&str>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}.{}", grid.year, grid.month0 + 1)?;

        if let Some(notice) = notice {
            writeln!(out, "{}", self.paint(notice, CODE_NOTICE))?;
        }

        let mut header = String::new();
        for (col, label) in WEEKDAY_LABELS.iter().enumerate() {
            let padded = fit_display(label, self.column_width, ' ');
            header.push_str(&match col {
                5 => self.paint(&padded, CODE_SATURDAY),
                6 => self.paint(&padded, CODE_SUNDAY),
                _ => padded,
            });
        }
        writeln!(out, "{}", header.trim_end())?;

        for (week_index, week) in grid.weeks.iter().enumerate() {
            self.write_week(&mut out, week, segments_for_week(bands, week_index))?;
        }

        Ok(())
    }

    fn write_week<W: Write>(
        &self,
        out: &mut W,
        week: &Week,
        week_bands: Vec<(&MultiDayBand, &BandSegment)>,
    ) -> anyhow::Result<()> {
        let mut date_row = String::new();
        for cell in &week.cells {
            let mut label = format!("{:>2}", cell.key.date().day());
            if let Some(holiday) = &cell.holiday_label {
                label.push(' ');
                label.push_str(holiday);
            }
            if cell.today {
                label.push(' ');
                label.push_str(TODAY_LABEL);
            }

            let padded = fit_display(&label, self.column_width, ' ');
            let painted = if cell.outside_month {
                self.paint(&padded, CODE_OUTSIDE)
            } else if cell.holiday || cell.sunday {
                self.paint(&padded, CODE_SUNDAY)
            } else if cell.saturday {
                self.paint(&padded, CODE_SATURDAY)
            } else {
                padded
            };
            date_row.push_str(&painted);
        }
        writeln!(out, "{}", date_row.trim_end())?;

        let widths = vec![self.column_width; DAYS_PER_WEEK];
        let content_rows = week
            .cells
            .iter()
            .map(|cell| cell.push_down + cell.singles.len())
            .max()
            .unwrap_or(0)
            .max(week_bands.len());

        for row in 0..content_rows {
            let mut spans: Vec<(usize, String)> = Vec::new();

            // Bands stack one row each, directly below the date row.
            if let Some((band, segment)) = week_bands.get(row) {
                let (left, width) =
                    segment_geometry(&widths, segment.start_col, segment.end_col, self.band_inset);
                let label = if segment.first { band.title.as_str() } else { "" };
                let text = fit_display(label, width, '─');
                spans.push((left, self.paint(&text, &band.code)));
            }

            // A cell's singles start below the last band covering it, so
            // spans on one row never overlap.
            for (col, cell) in week.cells.iter().enumerate() {
                if row < cell.push_down {
                    continue;
                }
                if let Some(single) = cell.singles.get(row - cell.push_down) {
                    let mut label = single.event.summary.clone();
                    if single.has_thumbnail() {
                        label.push_str(" 📷");
                    }
                    let text = fit_display(&label, self.column_width.saturating_sub(1), ' ');
                    spans.push((
                        col * self.column_width,
                        self.paint(&text, single.band.ansi_code()),
                    ));
                }
            }

            spans.sort_by_key(|(offset, _)| *offset);
            let mut line = String::new();
            let mut cursor = 0usize;
            for (offset, text) in spans {
                if offset > cursor {
                    line.push_str(&" ".repeat(offset - cursor));
                }
                cursor = offset + visible_width(&text);
                line.push_str(&text);
            }
            writeln!(out, "{}", line.trim_end())?;
        }

        Ok(())
    }

    pub fn write_event_detail<W: Write>(
        &self,
        mut out: W,
        event: &PlacedEvent,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", event.event.summary)?;
        writeln!(out)?;

        let description = event.event.description.as_deref().unwrap_or_default();
        for node in format_description(description)? {
            match node {
                ContentNode::Text(text) => write!(out, "{text}")?,
                ContentNode::Link { url } => write!(out, "{}", self.paint(&url, CODE_LINK))?,
                ContentNode::Image { url } => {
                    write!(out, "{}", self.paint(&format!("[image] {url}"), CODE_IMAGE))?;
                }
                ContentNode::LineBreak => writeln!(out)?,
            }
        }
        writeln!(out)?;

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

// Clips and pads to an exact display width; wide characters count as two
// columns.
fn fit_display(text: &str, width: usize, fill: char) -> String {
    let mut out = String::new();
    let mut used = 0usize;

    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(ch);
        used += w;
    }

    let fill_width = UnicodeWidthChar::width(fill).unwrap_or(1).max(1);
    while used + fill_width <= width {
        out.push(fill);
        used += fill_width;
    }
    while used < width {
        out.push(' ');
        used += 1;
    }
    out
}

fn visible_width(text: &str) -> usize {
    let mut width = 0usize;
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        width += UnicodeWidthChar::width(ch).unwrap_or(0);
    }
    width
}

#[cfg(test)]
mod tests {
    use super::{Renderer, fit_display, visible_width};
    use crate::config::{Config, RenderRules};
    use crate::event::SourceEvent;
    use crate::grid::CalendarGrid;
    use crate::place::populate_grid;

    fn plain_renderer() -> Renderer {
        Renderer::new(&RenderRules {
            color: "off".to_string(),
            ..RenderRules::default()
        })
        .expect("renderer builds")
    }

    fn render(grid: &CalendarGrid, bands: &[crate::band::MultiDayBand]) -> String {
        let mut buffer = Vec::new();
        plain_renderer()
            .write_month(&mut buffer, grid, bands, None)
            .expect("renders");
        String::from_utf8(buffer).expect("utf8 output")
    }

    #[test]
    fn month_header_and_weekday_row_lead_the_output() {
        let grid = CalendarGrid::build(2025, 4).expect("grid builds");
        let output = render(&grid, &[]);
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("2025.5"));
        let header = lines.next().expect("weekday header");
        assert!(header.starts_with("月"));
        assert!(header.contains("日"));
    }

    #[test]
    fn band_title_appears_once_across_weeks() {
        let cfg = Config::default();
        let mut grid = CalendarGrid::build(2025, 4).expect("grid builds");
        let events: Vec<SourceEvent> = serde_json::from_value(serde_json::json!([
            {
                "summary": "東京遠征",
                "start": { "date": "2025-05-09" },
                "end": { "date": "2025-05-14" },
            }
        ]))
        .expect("valid events json");
        let bands = populate_grid(&mut grid, &events, &cfg);

        let output = render(&grid, &bands);
        assert_eq!(output.matches("東京遠征").count(), 1);
        // The continuation week still draws band fill.
        assert!(output.matches('─').count() > 0);
    }

    #[test]
    fn notice_line_surfaces_fetch_failures() {
        let grid = CalendarGrid::build(2025, 4).expect("grid builds");
        let mut buffer = Vec::new();
        plain_renderer()
            .write_month(&mut buffer, &grid, &[], Some("events unavailable"))
            .expect("renders");
        let output = String::from_utf8(buffer).expect("utf8 output");
        assert!(output.contains("events unavailable"));
    }

    #[test]
    fn single_events_render_under_their_day() {
        let cfg = Config::default();
        let mut grid = CalendarGrid::build(2025, 4).expect("grid builds");
        let events: Vec<SourceEvent> = serde_json::from_value(serde_json::json!([
            {
                "summary": "ライブ",
                "start": { "date": "2025-05-10" },
                "end": { "date": "2025-05-11" },
            }
        ]))
        .expect("valid events json");
        let bands = populate_grid(&mut grid, &events, &cfg);

        let output = render(&grid, &bands);
        assert!(output.contains("ライブ"));
    }

    #[test]
    fn detail_view_prints_links_and_images() {
        let event: SourceEvent = serde_json::from_value(serde_json::json!({
            "summary": "ライブ",
            "description": "告知 https://x.test/flyer.jpg 詳細 https://x.test/page",
            "start": { "date": "2025-05-10" },
            "end": { "date": "2025-05-11" },
        }))
        .expect("valid event json");
        let placed = crate::place::classify(&event, &Config::default());

        let mut buffer = Vec::new();
        plain_renderer()
            .write_event_detail(&mut buffer, &placed)
            .expect("renders detail");
        let output = String::from_utf8(buffer).expect("utf8 output");
        assert!(output.starts_with("ライブ"));
        assert!(output.contains("[image] https://x.test/flyer.jpg"));
        assert!(output.contains("https://x.test/page"));
    }

    #[test]
    fn fit_display_counts_wide_characters() {
        assert_eq!(fit_display("昼", 4, ' '), "昼  ");
        assert_eq!(fit_display("東京遠征", 6, ' '), "東京遠");
        assert_eq!(fit_display("", 4, '─'), "────");
        assert_eq!(visible_width("昼  "), 4);
    }

    #[test]
    fn ansi_sequences_do_not_count_toward_width() {
        assert_eq!(visible_width("\x1b[34mab\x1b[0m"), 2);
    }
}
