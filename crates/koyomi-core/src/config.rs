use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{error, info, warn};

const CONFIG_FILE: &str = "koyomi.toml";
const CONFIG_ENV_VAR: &str = "KOYOMI_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedRules,

    #[serde(default)]
    pub keywords: KeywordRules,

    #[serde(default = "default_thumbs")]
    pub thumbs: Vec<ThumbRule>,

    #[serde(default)]
    pub palette: PaletteRules,

    #[serde(default)]
    pub render: RenderRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedRules::default(),
            keywords: KeywordRules::default(),
            thumbs: default_thumbs(),
            palette: PaletteRules::default(),
            render: RenderRules::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedRules {
    #[serde(default)]
    pub calendar_id: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_holiday_calendar_id")]
    pub holiday_calendar_id: String,

    /// Feed titles on the holiday calendar that are observances, not
    /// public holidays; filtered out after fetch.
    #[serde(default = "default_exclude_holidays")]
    pub exclude_holidays: Vec<String>,
}

impl Default for FeedRules {
    fn default() -> Self {
        Self {
            calendar_id: String::new(),
            api_key: String::new(),
            base_url: default_base_url(),
            holiday_calendar_id: default_holiday_calendar_id(),
            exclude_holidays: default_exclude_holidays(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRules {
    #[serde(default = "default_midday_keyword")]
    pub midday: String,

    #[serde(default = "default_evening_keyword")]
    pub evening: String,
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self {
            midday: default_midday_keyword(),
            evening: default_evening_keyword(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ThumbRule {
    pub keyword: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaletteRules {
    #[serde(default = "default_band_colors")]
    pub bands: Vec<BandColor>,

    #[serde(default = "default_band_code")]
    pub default_code: String,
}

impl Default for PaletteRules {
    fn default() -> Self {
        Self {
            bands: default_band_colors(),
            default_code: default_band_code(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BandColor {
    pub keyword: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderRules {
    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_column_width")]
    pub column_width: usize,

    #[serde(default = "default_band_inset")]
    pub band_inset: usize,
}

impl Default for RenderRules {
    fn default() -> Self {
        Self {
            color: default_color(),
            column_width: default_column_width(),
            band_inset: default_band_inset(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_holiday_calendar_id() -> String {
    "japanese__ja@holiday.calendar.google.com".to_string()
}

fn default_exclude_holidays() -> Vec<String> {
    ["節分", "雛祭り", "母の日", "七夕", "七五三", "クリスマス", "銀行休業日"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_midday_keyword() -> String {
    "昼".to_string()
}

fn default_evening_keyword() -> String {
    "夕方".to_string()
}

fn default_thumbs() -> Vec<ThumbRule> {
    [
        ("nasa", "https://github.com/nasasada/nasacalendar/raw/main/nasa.jpg"),
        ("dot-blue", "https://github.com/nasasada/nasacalendar/raw/main/img/dotblue3.jpg"),
        ("room", "https://github.com/nasasada/nasacalendar/raw/main/img/room.jpg"),
        ("buzz", "https://github.com/nasasada/nasacalendar/raw/main/img/BUZZ.jpg"),
    ]
    .into_iter()
    .map(|(keyword, url)| ThumbRule {
        keyword: keyword.to_string(),
        url: url.to_string(),
    })
    .collect()
}

fn default_band_colors() -> Vec<BandColor> {
    [("東京", "33"), ("山梨", "32")]
        .into_iter()
        .map(|(keyword, code)| BandColor {
            keyword: keyword.to_string(),
            code: code.to_string(),
        })
        .collect()
}

fn default_band_code() -> String {
    "34".to_string()
}

fn default_color() -> String {
    "on".to_string()
}

fn default_column_width() -> usize {
    14
}

fn default_band_inset() -> usize {
    2
}

impl Config {
    /// Resolution chain: explicit override path, then KOYOMI_CONFIG, then
    /// ./koyomi.toml. A missing file means defaults; a file that fails to
    /// parse is logged and also falls back to defaults.
    pub fn load(override_path: Option<&Path>) -> Self {
        let Some(path) = resolve_config_path(override_path) else {
            info!("no config path resolved; using defaults");
            return Self::default();
        };

        if !path.exists() {
            info!(file = %path.display(), "config file not found; using defaults");
            return Self::default();
        }

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                error!(file = %path.display(), error = %err, "failed reading config; using defaults");
                return Self::default();
            }
        };

        match toml::from_str::<Config>(&raw) {
            Ok(mut config) => {
                sanitize_config(&mut config);
                info!(
                    file = %path.display(),
                    calendar_id = %config.feed.calendar_id,
                    "loaded config"
                );
                config
            }
            Err(err) => {
                error!(file = %path.display(), error = %err, "failed parsing config; using defaults");
                Self::default()
            }
        }
    }
}

fn resolve_config_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir().ok().map(|dir| dir.join(CONFIG_FILE))
}

fn sanitize_config(config: &mut Config) {
    if config.render.column_width < 8 {
        warn!(
            column_width = config.render.column_width,
            "column width too narrow; using default"
        );
        config.render.column_width = default_column_width();
    }

    if config.render.band_inset >= config.render.column_width {
        warn!(
            band_inset = config.render.band_inset,
            "band inset exceeds a column; using default"
        );
        config.render.band_inset = default_band_inset();
    }

    if config.feed.base_url.trim().is_empty() {
        config.feed.base_url = default_base_url();
    }

    if config.palette.default_code.trim().is_empty() {
        config.palette.default_code = default_band_code();
    }
}
