use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::{DateTime, LocalResult, NaiveDate, SecondsFormat, TimeZone, Utc};
use tracing::{debug, warn};

use crate::config::FeedRules;
use crate::datekey::render_timezone;
use crate::event::SourceEvent;
use crate::grid::first_day_of_month;
use crate::nav::MonthCursor;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// Adjacent-month buffer, wide enough to cover every filler cell.
const WINDOW_LEAD_DAYS: i64 = 6;
const WINDOW_TRAIL_DAYS: i64 = 7;

#[derive(Debug, serde::Deserialize)]
struct FeedPage {
    #[serde(default)]
    items: Vec<SourceEvent>,
}

pub struct FeedClient {
    http: reqwest::Client,
    feed: FeedRules,
}

impl FeedClient {
    pub fn new(feed: &FeedRules) -> anyhow::Result<Self> {
        if feed.calendar_id.trim().is_empty() {
            return Err(anyhow!("no calendar id configured"));
        }
        if feed.api_key.trim().is_empty() {
            return Err(anyhow!("no API key configured"));
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building HTTP client for feed fetch")?;

        Ok(Self {
            http,
            feed: feed.clone(),
        })
    }

    pub async fn fetch_events(&self, cursor: MonthCursor) -> anyhow::Result<Vec<SourceEvent>> {
        let (time_min, time_max) = events_window(cursor)?;
        let items = self
            .fetch_page(&self.feed.calendar_id, time_min, time_max)
            .await?;
        debug!(count = items.len(), "fetched events feed");
        Ok(items)
    }

    pub async fn fetch_holidays(&self, cursor: MonthCursor) -> anyhow::Result<Vec<SourceEvent>> {
        let (time_min, time_max) = holiday_window(cursor)?;
        let items = self
            .fetch_page(&self.feed.holiday_calendar_id, time_min, time_max)
            .await?;
        let kept = filter_excluded(items, &self.feed.exclude_holidays);
        debug!(count = kept.len(), "fetched holiday feed");
        Ok(kept)
    }

    async fn fetch_page(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> anyhow::Result<Vec<SourceEvent>> {
        let url = self.feed_url(calendar_id, time_min, time_max)?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed requesting feed for {calendar_id}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed reading feed body for {calendar_id}"))?;

        if !status.is_success() {
            return Err(anyhow!("feed for {calendar_id} returned HTTP {status}"));
        }

        let page: FeedPage = serde_json::from_str(&body)
            .with_context(|| format!("failed parsing feed payload for {calendar_id}"))?;
        Ok(page.items)
    }

    fn feed_url(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> anyhow::Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(self.feed.base_url.trim())
            .with_context(|| format!("invalid feed base URL: {}", self.feed.base_url))?;

        url.path_segments_mut()
            .map_err(|()| anyhow!("feed base URL cannot carry a path"))?
            .push("calendars")
            .push(calendar_id)
            .push("events");

        url.query_pairs_mut()
            .append_pair("key", &self.feed.api_key)
            .append_pair("timeMin", &time_min.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("timeMax", &time_max.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        Ok(url)
    }
}

/// [month start - 6 days, next month + 7 days] in the rendering timezone.
pub fn events_window(cursor: MonthCursor) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let first = first_day_of_month(cursor.year, cursor.month0)?;
    let mut next = cursor;
    next.next();
    let next_first = first_day_of_month(next.year, next.month0)?;

    let lead = first
        .checked_sub_signed(chrono::Duration::days(WINDOW_LEAD_DAYS))
        .ok_or_else(|| anyhow!("window start out of range"))?;
    let trail = next_first
        .checked_add_signed(chrono::Duration::days(WINDOW_TRAIL_DAYS))
        .ok_or_else(|| anyhow!("window end out of range"))?;

    Ok((local_day_start(lead)?, local_day_end(trail)?))
}

/// The calendar month exactly.
pub fn holiday_window(cursor: MonthCursor) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let first = first_day_of_month(cursor.year, cursor.month0)?;
    let last = crate::grid::last_day_of_month(cursor.year, cursor.month0)?;
    Ok((local_day_start(first)?, local_day_end(last)?))
}

fn local_day_start(date: NaiveDate) -> anyhow::Result<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("failed to construct midnight for {date}"))?;
    local_to_utc(midnight)
}

fn local_day_end(date: NaiveDate) -> anyhow::Result<DateTime<Utc>> {
    let end = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| anyhow!("failed to construct end of day for {date}"))?;
    local_to_utc(end)
}

fn local_to_utc(naive: chrono::NaiveDateTime) -> anyhow::Result<DateTime<Utc>> {
    match render_timezone().from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            warn!(first = %first, second = %second, "ambiguous local datetime; using earliest");
            Ok(first.min(second).with_timezone(&Utc))
        }
        LocalResult::None => Err(anyhow!(
            "local datetime does not exist in rendering timezone: {naive}"
        )),
    }
}

fn filter_excluded(items: Vec<SourceEvent>, exclude: &[String]) -> Vec<SourceEvent> {
    items
        .into_iter()
        .filter(|item| !exclude.iter().any(|title| title == &item.summary))
        .collect()
}

/// Each navigation begins a new generation; results of fetches started
/// under an older one are discarded instead of populating a grid they no
/// longer belong to.
#[derive(Debug, Default)]
pub struct FeedSession {
    generation: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderGeneration(u64);

impl FeedSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> RenderGeneration {
        RenderGeneration(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[must_use]
    pub fn is_current(&self, generation: RenderGeneration) -> bool {
        self.generation.load(Ordering::SeqCst) == generation.0
    }

    pub fn accept<T>(&self, generation: RenderGeneration, value: T) -> Option<T> {
        if self.is_current(generation) {
            Some(value)
        } else {
            warn!(generation = generation.0, "discarding superseded fetch result");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::{FeedSession, events_window, filter_excluded, holiday_window};
    use crate::datekey::render_timezone;
    use crate::event::SourceEvent;
    use crate::nav::MonthCursor;

    fn local_date(dt: chrono::DateTime<chrono::Utc>) -> (String, u32) {
        let local = dt.with_timezone(render_timezone());
        (local.date_naive().to_string(), local.hour())
    }

    #[test]
    fn events_window_buffers_both_ends() {
        let (min, max) = events_window(MonthCursor::new(2025, 4)).expect("window");
        assert_eq!(local_date(min), ("2025-04-25".to_string(), 0));
        assert_eq!(local_date(max), ("2025-06-08".to_string(), 23));
    }

    #[test]
    fn events_window_wraps_december() {
        let (min, max) = events_window(MonthCursor::new(2025, 11)).expect("window");
        assert_eq!(local_date(min), ("2025-11-25".to_string(), 0));
        assert_eq!(local_date(max), ("2026-01-08".to_string(), 23));
    }

    #[test]
    fn holiday_window_is_the_exact_month() {
        let (min, max) = holiday_window(MonthCursor::new(2025, 4)).expect("window");
        assert_eq!(local_date(min), ("2025-05-01".to_string(), 0));
        assert_eq!(local_date(max), ("2025-05-31".to_string(), 23));
    }

    #[test]
    fn excluded_titles_are_filtered() {
        let items: Vec<SourceEvent> = serde_json::from_value(serde_json::json!([
            { "summary": "こどもの日", "start": { "date": "2025-05-05" }, "end": { "date": "2025-05-06" } },
            { "summary": "母の日", "start": { "date": "2025-05-11" }, "end": { "date": "2025-05-12" } },
        ]))
        .expect("valid items json");

        let kept = filter_excluded(items, &["母の日".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].summary, "こどもの日");
    }

    #[test]
    fn superseded_generation_is_discarded() {
        let session = FeedSession::new();
        let stale = session.begin();
        let current = session.begin();

        assert_eq!(session.accept(stale, "old"), None);
        assert_eq!(session.accept(current, "new"), Some("new"));
    }
}
