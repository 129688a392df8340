//! Validated query parameters for the analytics routes.
//!
//! Every analytics request deserializes into one of these structs and is
//! checked here, at the HTTP boundary: unknown granularities, inverted date
//! ranges, and out-of-range limits are rejected with a 400 before the
//! aggregation engine is ever invoked. The engine treats such input as a
//! caller contract violation, not a recoverable condition.

use serde::Deserialize;
use time::Date;

use crate::Error;

use super::engine::{DateRange, Granularity};

/// The default number of months covered by the spending-trends window.
const DEFAULT_TRENDS_MONTHS: u32 = 6;
/// The largest spending-trends window a request may ask for.
const MAX_TRENDS_MONTHS: i64 = 120;
/// The default page size for the raw transaction listing.
const DEFAULT_SCAN_LIMIT: u64 = 100;

/// An optional inclusive date range, as sent by the client.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    /// The first date to include.
    pub start_date: Option<Date>,
    /// The last date to include.
    pub end_date: Option<Date>,
}

impl RangeQuery {
    /// Validate the bounds and convert to an engine [DateRange].
    ///
    /// # Errors
    /// Returns an [Error::InvalidQuery] if both bounds are present and the
    /// start is after the end.
    pub fn validate(&self) -> Result<DateRange, Error> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(Error::InvalidQuery(format!(
                    "startDate {start} is after endDate {end}"
                )));
            }
        }

        Ok(DateRange::new(self.start_date, self.end_date))
    }
}

fn parse_granularity(raw: Option<&str>, default: Granularity) -> Result<Granularity, Error> {
    match raw {
        None => Ok(default),
        Some("day") => Ok(Granularity::Day),
        Some("week") => Ok(Granularity::Week),
        Some("month") => Ok(Granularity::Month),
        Some(other) => Err(Error::InvalidQuery(format!(
            "groupBy must be one of day, week, or month, got {other:?}"
        ))),
    }
}

/// Query parameters for the time-bucketed analytics routes.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketQuery {
    /// The first date to include.
    pub start_date: Option<Date>,
    /// The last date to include.
    pub end_date: Option<Date>,
    /// The bucket granularity: "day", "week", or "month".
    pub group_by: Option<String>,
}

impl BucketQuery {
    /// Validate the bounds and convert to an engine [DateRange].
    pub fn validate_range(&self) -> Result<DateRange, Error> {
        RangeQuery {
            start_date: self.start_date,
            end_date: self.end_date,
        }
        .validate()
    }

    /// Validate the granularity, falling back to `default` when absent.
    ///
    /// # Errors
    /// Returns an [Error::InvalidQuery] for anything other than "day",
    /// "week", or "month".
    pub fn validate_granularity(&self, default: Granularity) -> Result<Granularity, Error> {
        parse_granularity(self.group_by.as_deref(), default)
    }
}

/// Query parameters for the top-categories route.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCategoriesQuery {
    /// The first date to include.
    pub start_date: Option<Date>,
    /// The last date to include.
    pub end_date: Option<Date>,
    /// The maximum number of categories to return.
    pub limit: Option<i64>,
}

impl TopCategoriesQuery {
    /// Validate the bounds and convert to an engine [DateRange].
    pub fn validate_range(&self) -> Result<DateRange, Error> {
        RangeQuery {
            start_date: self.start_date,
            end_date: self.end_date,
        }
        .validate()
    }

    /// The requested limit with non-positive values clamped to zero.
    ///
    /// The engine treats a zero limit as "use the default", so a client
    /// sending `limit=0` or `limit=-3` gets the default-length ranking
    /// rather than an error.
    pub fn clamped_limit(&self) -> usize {
        self.limit.unwrap_or(0).max(0) as usize
    }
}

/// Query parameters for the spending-trends route.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TrendsQuery {
    /// How many months back the trailing window reaches.
    pub months: Option<i64>,
}

impl TrendsQuery {
    /// Validate the window length, falling back to six months.
    ///
    /// # Errors
    /// Returns an [Error::InvalidQuery] if the window is not between 1 and
    /// 120 months.
    pub fn validate_months(&self) -> Result<u32, Error> {
        match self.months {
            None => Ok(DEFAULT_TRENDS_MONTHS),
            Some(months) if (1..=MAX_TRENDS_MONTHS).contains(&months) => Ok(months as u32),
            Some(months) => Err(Error::InvalidQuery(format!(
                "months must be between 1 and {MAX_TRENDS_MONTHS}, got {months}"
            ))),
        }
    }
}

/// Query parameters for the raw transaction listing used by the dashboard.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanQuery {
    /// The first date to include.
    pub start_date: Option<Date>,
    /// The last date to include.
    pub end_date: Option<Date>,
    /// The maximum number of rows to return.
    pub limit: Option<u64>,
    /// The number of rows to skip before the first returned row.
    pub skip: Option<u64>,
    /// The sort key: "date" for ascending, "-date" for descending.
    pub sort: Option<String>,
}

impl ScanQuery {
    /// Validate the bounds and convert to an engine [DateRange].
    pub fn validate_range(&self) -> Result<DateRange, Error> {
        RangeQuery {
            start_date: self.start_date,
            end_date: self.end_date,
        }
        .validate()
    }

    /// The limit to apply to the scan, defaulting to 100.
    pub fn limit(&self) -> u64 {
        match self.limit {
            Some(limit) if limit > 0 => limit,
            _ => DEFAULT_SCAN_LIMIT,
        }
    }

    /// The number of rows to skip, defaulting to zero.
    pub fn skip(&self) -> u64 {
        self.skip.unwrap_or(0)
    }

    /// Whether the scan should run newest-first.
    ///
    /// # Errors
    /// Returns an [Error::InvalidQuery] for sort keys other than "date" and
    /// "-date".
    pub fn descending(&self) -> Result<bool, Error> {
        match self.sort.as_deref() {
            None | Some("-date") => Ok(true),
            Some("date") => Ok(false),
            Some(other) => Err(Error::InvalidQuery(format!(
                "sort must be date or -date, got {other:?}"
            ))),
        }
    }
}
