//! Timestamp fields, absolute or relative

use std::fmt::Write as _;
use std::time::SystemTime;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};

use crate::entry::Entry;
use crate::error::{ConfigError, ResolveError};
use crate::fs::{FileSystem, TimeKind};
use crate::style::{SharedStyle, StyleKind};

pub const DEFAULT_TIME_FORMAT: &str = "%d.%b'%y %H:%M";

/// How a timestamp is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeFormat {
    /// chrono strftime pattern.
    Strftime(String),
    /// "3 hours ago", "in 2 days".
    Relative,
}

impl Default for TimeFormat {
    fn default() -> Self {
        TimeFormat::Strftime(DEFAULT_TIME_FORMAT.to_string())
    }
}

impl TimeFormat {
    /// Parse a `--time-style` value: a preset name or `+FORMAT`.
    pub fn parse_style(style: &str) -> Result<Self, ConfigError> {
        let pattern = match style {
            "full-iso" => "%Y-%m-%d %H:%M:%S%.9f %z",
            "long-iso" => "%Y-%m-%d %H:%M",
            "iso" => "%m-%d %H:%M",
            "locale" => "%b %d %H:%M",
            "default" => DEFAULT_TIME_FORMAT,
            "relative" => return Ok(TimeFormat::Relative),
            custom => custom
                .strip_prefix('+')
                .ok_or_else(|| ConfigError::UnknownTimeStyle(style.to_string()))?,
        };
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::UnknownTimeStyle(style.to_string()));
        }
        Ok(TimeFormat::Strftime(pattern.to_string()))
    }
}

/// Renders one of the modified/accessed/created timestamps.
pub struct TimeResolver {
    style: SharedStyle,
    kind: TimeKind,
    format: TimeFormat,
    field: String,
}

impl TimeResolver {
    pub fn new(style: SharedStyle, kind: TimeKind, format: TimeFormat) -> Self {
        let prefix = match format {
            TimeFormat::Relative => "Relative-Time",
            TimeFormat::Strftime(_) => "Time",
        };
        Self {
            field: format!("{prefix} {}", kind.label()),
            style,
            kind,
            format,
        }
    }

    fn render(&self, time: SystemTime) -> Result<String, ResolveError> {
        match &self.format {
            TimeFormat::Relative => Ok(relative_time(SystemTime::now(), time)),
            TimeFormat::Strftime(pattern) => {
                let local: DateTime<Local> = time.into();
                let mut out = String::new();
                write!(out, "{}", local.format(pattern))
                    .map_err(|_| ResolveError::Detection("bad_time_format".to_string()))?;
                Ok(out)
            }
        }
    }
}

impl super::Resolver for TimeResolver {
    fn field(&self) -> &str {
        &self.field
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        let time = entry.stat.time(self.kind).ok_or(ResolveError::Unavailable)?;
        Ok(self.style.paint(StyleKind::Time, &self.render(time)?))
    }
}

const UNITS: [(u64, &str); 6] = [
    (365 * 24 * 3600, "year"),
    (7 * 24 * 3600, "week"),
    (24 * 3600, "day"),
    (3600, "hour"),
    (60, "minute"),
    (1, "second"),
];

/// Largest whole unit between `now` and `then`.
pub fn relative_time(now: SystemTime, then: SystemTime) -> String {
    let (secs, future) = match now.duration_since(then) {
        Ok(d) => (d.as_secs(), false),
        Err(e) => (e.duration().as_secs(), true),
    };
    if secs == 0 {
        return "now".to_string();
    }
    let (count, unit) = UNITS
        .iter()
        .find(|(size, _)| secs >= *size)
        .map(|(size, unit)| (secs / size, *unit))
        .unwrap_or((secs, "second"));
    let plural = if count == 1 { "" } else { "s" };
    if future {
        format!("in {count} {unit}{plural}")
    } else {
        format!("{count} {unit}{plural} ago")
    }
}
