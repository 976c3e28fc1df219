use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::nav::MonthCursor;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "koyomi",
    version,
    about = "Koyomi: month-grid calendar view over remote event feeds",
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Month to render as YYYY-MM; defaults to the current month in the
    /// rendering timezone.
    #[arg(long = "month")]
    pub month: Option<String>,

    /// Months to navigate from the selected month, negative for previous.
    #[arg(long = "offset", default_value_t = 0, allow_hyphen_values = true)]
    pub offset: i32,

    /// Print the detail view of the Nth placed single-day event (1-based).
    #[arg(long = "detail")]
    pub detail: Option<usize>,

    /// Skip feed fetches and render the empty grid.
    #[arg(long = "offline")]
    pub offline: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

pub fn parse_month(raw: &str) -> anyhow::Result<MonthCursor> {
    let (year_text, month_text) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| anyhow!("expected YYYY-MM, got: {raw}"))?;

    let year: i32 = year_text
        .parse()
        .map_err(|_| anyhow!("invalid year in month argument: {raw}"))?;
    let month: u32 = month_text
        .parse()
        .map_err(|_| anyhow!("invalid month in month argument: {raw}"))?;

    if !(1..=12).contains(&month) {
        return Err(anyhow!("month out of range in {raw}: {month}"));
    }

    Ok(MonthCursor::new(year, month - 1))
}
