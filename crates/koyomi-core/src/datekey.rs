use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str = "koyomi.toml";
const TIMEZONE_ENV_VAR: &str = "KOYOMI_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "KOYOMI_CONFIG";
const DEFAULT_RENDER_TIMEZONE: &str = "Asia/Tokyo";

const KEY_FORMAT: &str = "%Y-%m-%d";

/// Canonical identity of one calendar day in the rendering timezone. All
/// cell lookups and "same day" comparisons go through this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Normalizes into the rendering timezone before deriving the key,
    /// independent of the host's local timezone.
    #[must_use]
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.with_timezone(render_timezone()).date_naive())
    }

    #[must_use]
    pub fn today(now: DateTime<Utc>) -> Self {
        Self::from_utc(now)
    }

    #[must_use]
    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn succ(self) -> anyhow::Result<Self> {
        self.0
            .succ_opt()
            .map(Self)
            .ok_or_else(|| anyhow!("date overflow after {self}"))
    }

    pub fn pred(self) -> anyhow::Result<Self> {
        self.0
            .pred_opt()
            .map(Self)
            .ok_or_else(|| anyhow!("date underflow before {self}"))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(KEY_FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), KEY_FORMAT)
            .map(Self)
            .map_err(|err| anyhow!("invalid date key {s:?}: {err}"))
    }
}

#[must_use]
pub fn same_day(a: DateKey, b: DateKey) -> bool {
    a == b
}

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

pub fn render_timezone() -> &'static Tz {
    static RENDER_TZ: OnceLock<Tz> = OnceLock::new();
    RENDER_TZ.get_or_init(resolve_render_timezone)
}

fn resolve_render_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR) {
        if let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR) {
            return tz;
        }
    }

    if let Some(path) = timezone_config_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    parse_timezone(DEFAULT_RENDER_TIMEZONE, "DEFAULT_RENDER_TIMEZONE").unwrap_or_else(|| {
        tracing::error!("failed to parse fallback timezone; using UTC");
        chrono_tz::UTC
    })
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        tracing::info!(file = %path.display(), "timezone config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed reading timezone config file"
            );
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed parsing timezone config file"
            );
            return None;
        }
    };

    let timezone = parsed
        .timezone
        .or_else(|| parsed.time.and_then(|section| section.timezone));
    let Some(timezone) = timezone else {
        tracing::warn!(file = %path.display(), "timezone config had no timezone field");
        return None;
    };

    parse_timezone(timezone.as_str(), &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured rendering timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(
                source,
                timezone = %trimmed,
                error = %err,
                "failed to parse timezone id"
            );
            None
        }
    }
}
