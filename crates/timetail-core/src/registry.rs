//! Name-keyed table of supported log formats.
//!
//! Each [`FormatSpec`] pairs a regular expression that locates the timestamp
//! inside a raw line with the layout used to parse the located text, plus
//! the cutoff the scanner compares parsed timestamps against.
//!
//! The table is built once at startup: [`register`] yields the built-in
//! entries, [`merge`] folds in formats supplied by the config file, and
//! [`with_cutoff`] stamps every entry with the same `now - window` instant.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::format::ParseErrorKind;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use regex::Regex;
use tracing::debug;

use crate::clock::Clock;
use crate::error::TailError;

/// Layout keyword selecting RFC 3339 parsing (accepts both `Z` and `±hh:mm`).
pub const RFC3339_LAYOUT: &str = "rfc3339";

/// Registry keyed by format name, iterated in name order.
pub type FormatTable = BTreeMap<String, FormatSpec>;

/// How the text matched by a format's pattern becomes an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeLayout {
    /// RFC 3339 / ISO 8601 with an explicit offset.
    Rfc3339,
    /// A `chrono` strftime layout. Layouts without an offset are read as UTC.
    Strftime(String),
}

impl TimeLayout {
    /// Interpret a layout string from the registry or a config file.
    #[must_use]
    pub fn from_layout(layout: &str) -> Self {
        if layout.eq_ignore_ascii_case(RFC3339_LAYOUT) {
            Self::Rfc3339
        } else {
            Self::Strftime(layout.to_string())
        }
    }

    /// Parse `text` into an absolute instant.
    ///
    /// # Errors
    ///
    /// Returns the `chrono` parse error when `text` does not fit the layout,
    /// including out-of-range fields such as day 32.
    pub fn parse(&self, text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match self {
            Self::Rfc3339 => DateTime::parse_from_rfc3339(text).map(|ts| ts.with_timezone(&Utc)),
            Self::Strftime(layout) => parse_strftime(text, layout),
        }
    }
}

impl fmt::Display for TimeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rfc3339 => f.write_str(RFC3339_LAYOUT),
            Self::Strftime(layout) => f.write_str(layout),
        }
    }
}

// Offset-bearing layouts first; fall back to naive date-time, then date only.
fn parse_strftime(text: &str, layout: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let err = match DateTime::parse_from_str(text, layout) {
        Ok(ts) => return Ok(ts.with_timezone(&Utc)),
        Err(err) if err.kind() == ParseErrorKind::NotEnough => err,
        Err(err) => return Err(err),
    };

    match NaiveDateTime::parse_from_str(text, layout) {
        Ok(naive) => return Ok(Utc.from_utc_datetime(&naive)),
        Err(naive_err) if naive_err.kind() != ParseErrorKind::NotEnough => return Err(naive_err),
        Err(_) => {}
    }

    NaiveDate::parse_from_str(text, layout)
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::default())))
        .map_err(|_| err)
}

/// One registered log format.
#[derive(Debug, Clone)]
pub struct FormatSpec {
    name: String,
    pattern: Regex,
    layout: TimeLayout,
    cutoff: DateTime<Utc>,
}

impl FormatSpec {
    /// Compile a format entry. The cutoff starts at the earliest
    /// representable instant until [`with_cutoff`] replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::InvalidPattern`] if `pattern` does not compile.
    pub fn new(name: &str, pattern: &str, layout: &str) -> Result<Self, TailError> {
        let pattern = Regex::new(pattern).map_err(|source| TailError::InvalidPattern {
            name: name.to_string(),
            source,
        })?;

        Ok(Self {
            name: name.to_string(),
            pattern,
            layout: TimeLayout::from_layout(layout),
            cutoff: DateTime::<Utc>::MIN_UTC,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn pattern(&self) -> &Regex {
        &self.pattern
    }

    #[must_use]
    pub const fn layout(&self) -> &TimeLayout {
        &self.layout
    }

    /// Lines must be strictly newer than this instant to be kept.
    #[must_use]
    pub const fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// Locate the timestamp substring inside a raw line.
    #[must_use]
    pub fn find_timestamp<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.pattern.find(line).map(|m| m.as_str())
    }

    /// Parse text previously located by [`FormatSpec::find_timestamp`].
    ///
    /// # Errors
    ///
    /// Propagates the layout's parse error.
    pub fn parse_timestamp(&self, text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        self.layout.parse(text)
    }

    /// True when `ts` falls inside the trailing window.
    #[must_use]
    pub fn is_recent(&self, ts: DateTime<Utc>) -> bool {
        ts > self.cutoff
    }
}

/// The built-in format table.
///
/// # Panics
///
/// Panics only if a built-in pattern stops compiling, which the unit tests
/// rule out.
#[must_use]
pub fn register() -> FormatTable {
    const BUILTIN: [(&str, &str, &str); 2] = [
        (
            "nginx",
            r"\d{2}/[a-zA-Z]{3}/\d{4}:\d{2}:\d{2}:\d{2} [+-]\d{4}",
            "%d/%b/%Y:%H:%M:%S %z",
        ),
        (
            "iso8601",
            r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})",
            RFC3339_LAYOUT,
        ),
    ];

    BUILTIN
        .iter()
        .map(|(name, pattern, layout)| {
            let spec = FormatSpec::new(name, pattern, layout).expect("built-in pattern compiles");
            ((*name).to_string(), spec)
        })
        .collect()
}

/// Fold extra formats into `table`. An entry whose name is already present
/// replaces the existing one.
#[must_use]
pub fn merge(mut table: FormatTable, extra: impl IntoIterator<Item = FormatSpec>) -> FormatTable {
    for spec in extra {
        if table.contains_key(spec.name()) {
            debug!(format = spec.name(), "config entry overrides built-in format");
        }
        table.insert(spec.name().to_string(), spec);
    }
    table
}

/// Compute `now - window` from a single clock reading.
///
/// A window reaching past the earliest representable instant keeps every
/// timestamped line.
#[must_use]
pub fn cutoff_for(window: Duration, clock: &dyn Clock) -> DateTime<Utc> {
    let now = clock.now();
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Return `table` with every entry's cutoff set to the same `now - window`.
#[must_use]
pub fn with_cutoff(table: FormatTable, window: Duration, clock: &dyn Clock) -> FormatTable {
    let cutoff = cutoff_for(window, clock);
    debug!(%cutoff, window_secs = window.as_secs(), "cutoff computed");

    table
        .into_iter()
        .map(|(name, spec)| (name, FormatSpec { cutoff, ..spec }))
        .collect()
}

/// Look up a format by name.
///
/// # Errors
///
/// Returns [`TailError::UnknownFormat`] listing the registered names when
/// `name` is absent.
pub fn lookup<'a>(table: &'a FormatTable, name: &str) -> Result<&'a FormatSpec, TailError> {
    table.get(name).ok_or_else(|| TailError::UnknownFormat {
        name: name.to_string(),
        available: table.keys().cloned().collect(),
    })
}
