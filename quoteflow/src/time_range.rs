//! Half-open event-time ranges.

use chrono::{NaiveDate, NaiveDateTime};
use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};
use std::fmt;

/// Accepted `--from` / `--to` layouts, most specific first.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Rendering used inside statements.
const SQL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `[from, to)` over event time. Always non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    from: NaiveDateTime,
    to: NaiveDateTime,
}

impl TimeRange {
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> QuoteflowResult<Self> {
        if to <= from {
            return Err(QuoteflowError::Validation(format!(
                "--to ({}) must be after --from ({})",
                to.format(SQL_FORMAT),
                from.format(SQL_FORMAT)
            )));
        }
        Ok(Self { from, to })
    }

    /// Parse both bounds from command-line text.
    pub fn parse(from: &str, to: &str) -> QuoteflowResult<Self> {
        Self::new(parse_timestamp("--from", from)?, parse_timestamp("--to", to)?)
    }

    /// `ts >= '<from>' AND ts < '<to>'`
    pub fn sql_condition(&self, column: &str) -> String {
        format!(
            "{column} >= '{}' AND {column} < '{}'",
            self.from.format(SQL_FORMAT),
            self.to.format(SQL_FORMAT)
        )
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.from.format(SQL_FORMAT),
            self.to.format(SQL_FORMAT)
        )
    }
}

fn parse_timestamp(flag: &str, value: &str) -> QuoteflowResult<NaiveDateTime> {
    let value = value.trim();

    if let Some(ts) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    {
        return Ok(ts);
    }

    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| {
            QuoteflowError::Validation(format!(
                "{flag}: cannot parse '{value}', expected YYYY-MM-DDTHH:MM:SS"
            ))
        })
}
