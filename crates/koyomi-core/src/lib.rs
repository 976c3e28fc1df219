pub mod band;
pub mod cli;
pub mod config;
pub mod content;
pub mod datekey;
pub mod event;
pub mod grid;
pub mod mark;
pub mod nav;
pub mod place;
pub mod render;
pub mod source;

use std::ffi::OsString;

use anyhow::{Context, anyhow};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use crate::cli::GlobalCli;
use crate::config::Config;
use crate::datekey::DateKey;
use crate::event::SourceEvent;
use crate::grid::CalendarGrid;
use crate::nav::MonthCursor;
use crate::render::Renderer;
use crate::source::{FeedClient, FeedSession};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let args = GlobalCli::parse_from(raw_args);
    cli::init_tracing(args.verbose, args.quiet)?;

    info!(
        verbose = args.verbose,
        quiet = args.quiet,
        offline = args.offline,
        "starting koyomi"
    );

    let cfg = Config::load(args.config.as_deref());

    let now = Utc::now();
    let mut cursor = match &args.month {
        Some(raw) => cli::parse_month(raw)?,
        None => MonthCursor::current(now),
    };
    cursor.shift(args.offset);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;
    runtime.block_on(render_month(&cfg, cursor, &args, DateKey::today(now)))?;

    info!("done");
    Ok(())
}

/// One render: build the empty grid, fetch both feeds, place events, mark
/// holidays and today, project to the terminal. Feed failures degrade to
/// an empty feed with a visible notice; they never abort the render.
async fn render_month(
    cfg: &Config,
    cursor: MonthCursor,
    args: &GlobalCli,
    today: DateKey,
) -> anyhow::Result<()> {
    let mut grid = CalendarGrid::build(cursor.year, cursor.month0)?;

    let session = FeedSession::new();
    let generation = session.begin();

    let mut notices = Vec::new();
    let (events, holidays) = if args.offline {
        (Vec::new(), Vec::new())
    } else {
        let fetched = fetch_feeds(cfg, cursor, &mut notices).await;
        // A newer navigation would have begun a fresh generation; results
        // from this one would no longer belong to the grid being rendered.
        session.accept(generation, fetched).unwrap_or_default()
    };

    let bands = place::populate_grid(&mut grid, &events, cfg);
    mark::mark_holidays(&mut grid, &holidays);
    mark::mark_today(&mut grid, today);

    let notice = if notices.is_empty() {
        None
    } else {
        Some(notices.join("; "))
    };

    let mut renderer = Renderer::new(&cfg.render)?;
    renderer.print_month(&grid, &bands, notice.as_deref())?;

    if let Some(index) = args.detail {
        let placed = grid
            .placed_singles()
            .nth(index.saturating_sub(1))
            .map(|(_, event)| event.clone())
            .ok_or_else(|| anyhow!("no placed single-day event at index {index}"))?;
        renderer.print_event_detail(&placed)?;
    }

    Ok(())
}

/// Both feeds are awaited before placement starts; each degrades to an
/// empty feed on its own failure.
async fn fetch_feeds(
    cfg: &Config,
    cursor: MonthCursor,
    notices: &mut Vec<String>,
) -> (Vec<SourceEvent>, Vec<SourceEvent>) {
    let client = match FeedClient::new(&cfg.feed) {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "feed client unavailable; rendering empty month");
            notices.push(format!("feeds unavailable: {err:#}"));
            return (Vec::new(), Vec::new());
        }
    };

    let (events_result, holidays_result) = tokio::join!(
        client.fetch_events(cursor),
        client.fetch_holidays(cursor)
    );

    let events = match events_result {
        Ok(events) => events,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "events fetch failed; placing nothing");
            notices.push(format!("events unavailable: {err:#}"));
            Vec::new()
        }
    };

    let holidays = match holidays_result {
        Ok(holidays) => holidays,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "holiday fetch failed; marking nothing");
            notices.push(format!("holidays unavailable: {err:#}"));
            Vec::new()
        }
    };

    (events, holidays)
}
