use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::config::{KeywordRules, PaletteRules};
use crate::datekey::DateKey;

/// One raw record from the events or holiday feed, in the wire shape.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SourceEvent {
    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub start: Option<EventStamp>,

    #[serde(default)]
    pub end: Option<EventStamp>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EventStamp {
    #[serde(default)]
    pub date: Option<NaiveDate>,

    #[serde(default, rename = "dateTime")]
    pub date_time: Option<DateTime<Utc>>,
}

impl EventStamp {
    fn key(&self) -> Option<DateKey> {
        if let Some(dt) = self.date_time {
            return Some(DateKey::from_utc(dt));
        }
        self.date.map(DateKey::new)
    }

    fn is_date_only(&self) -> bool {
        self.date_time.is_none() && self.date.is_some()
    }
}

/// Resolved day range. All-day raw ends are one day past the last included
/// day; `resolve` subtracts it before any key or band range is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSpan {
    pub start: DateKey,
    pub end: DateKey,
    pub all_day: bool,
}

impl EventSpan {
    pub fn resolve(event: &SourceEvent) -> Option<Self> {
        let (Some(start_stamp), Some(end_stamp)) = (&event.start, &event.end) else {
            warn!(title = %event.summary, "event missing start or end; skipping");
            return None;
        };

        let (Some(start), Some(raw_end)) = (start_stamp.key(), end_stamp.key()) else {
            warn!(title = %event.summary, "event start or end carries no usable value; skipping");
            return None;
        };

        let all_day = start_stamp.is_date_only() && end_stamp.is_date_only();
        let end = if all_day {
            match raw_end.pred() {
                Ok(end) => end,
                Err(err) => {
                    warn!(title = %event.summary, error = %err, "all-day end correction failed; skipping");
                    return None;
                }
            }
        } else {
            raw_end
        };

        Some(Self {
            start,
            end: end.max(start),
            all_day,
        })
    }

    #[must_use]
    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }
}

/// Derived once from the title and carried as data; controls both stacking
/// order and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBand {
    Midday,
    Evening,
    Night,
}

impl TimeBand {
    #[must_use]
    pub fn classify(title: &str, rules: &KeywordRules) -> Self {
        if title.contains(&rules.midday) {
            Self::Midday
        } else if title.contains(&rules.evening) {
            Self::Evening
        } else {
            Self::Night
        }
    }

    #[must_use]
    pub fn ansi_code(self) -> &'static str {
        match self {
            Self::Midday => "33",
            Self::Evening => "31",
            Self::Night => "34",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedEvent {
    pub event: SourceEvent,
    pub band: TimeBand,
    pub thumbnails: Vec<String>,
}

impl PlacedEvent {
    #[must_use]
    pub fn has_thumbnail(&self) -> bool {
        !self.thumbnails.is_empty()
    }
}

#[must_use]
pub fn band_palette_code(title: &str, palette: &PaletteRules) -> String {
    for entry in &palette.bands {
        if title.contains(&entry.keyword) {
            return entry.code.clone();
        }
    }
    palette.default_code.clone()
}
