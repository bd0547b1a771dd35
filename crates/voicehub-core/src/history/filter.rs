//! History filtering
//!
//! Filters are pure: they never reorder or mutate the input, applying the
//! same criteria twice gives the same result, and all criteria combine with
//! AND. An unset criterion matches everything.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{CallRecord, MessageRecord};
use crate::error::{ClientError, ClientResult};

/// Upper bound (inclusive) of a short call, in seconds
pub const SHORT_CALL_MAX_SECS: u64 = 60;
/// Upper bound (inclusive) of a medium call, in seconds
pub const MEDIUM_CALL_MAX_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// The backend reports `inbound`, `outbound-api`, `outbound-dial` and so
    /// on; match on the prefix.
    pub fn matches(&self, raw: Option<&str>) -> bool {
        let Some(raw) = raw else {
            return false;
        };
        let raw = raw.trim().to_ascii_lowercase();
        match self {
            Direction::Inbound => raw.starts_with("inbound"),
            Direction::Outbound => raw.starts_with("outbound"),
        }
    }
}

impl FromStr for Direction {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbound" | "in" => Ok(Direction::Inbound),
            "outbound" | "out" => Ok(Direction::Outbound),
            other => Err(ClientError::config(format!("unknown direction '{}'", other))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        })
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationBucket {
    /// Up to 60 s
    Short,
    /// Over 60 s, up to 300 s
    Medium,
    /// Over 300 s
    Long,
}

impl DurationBucket {
    pub fn classify(secs: u64) -> Self {
        if secs <= SHORT_CALL_MAX_SECS {
            DurationBucket::Short
        } else if secs <= MEDIUM_CALL_MAX_SECS {
            DurationBucket::Medium
        } else {
            DurationBucket::Long
        }
    }
}

impl FromStr for DurationBucket {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(DurationBucket::Short),
            "medium" => Ok(DurationBucket::Medium),
            "long" => Ok(DurationBucket::Long),
            other => Err(ClientError::config(format!("unknown duration bucket '{}'", other))),
        }
    }
}

impl fmt::Display for DurationBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DurationBucket::Short => "short",
            DurationBucket::Medium => "medium",
            DurationBucket::Long => "long",
        })
    }
}

/// Inclusive range of calendar days, read in a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub offset: FixedOffset,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ClientResult<Self> {
        if start > end {
            return Err(ClientError::config(format!("date range starts ({}) after it ends ({})", start, end)));
        }
        Ok(Self {
            start,
            end,
            offset: Utc.fix(),
        })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
            offset: Utc.fix(),
        }
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// True when the instant falls on one of the range's days, end day
    /// included up to its last second
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let day = instant.with_timezone(&self.offset).date_naive();
        self.start <= day && day <= self.end
    }
}

/// Criteria applied to call and message history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    /// Case-insensitive substring of from, to, sid (and body for messages)
    pub search: Option<String>,
    /// Case-insensitive exact status
    pub status: Option<String>,
    pub direction: Option<Direction>,
    /// Records without a readable timestamp never match a date range
    pub date_range: Option<DateRange>,
    /// Calls only
    pub duration: Option<DurationBucket>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_duration(mut self, bucket: DurationBucket) -> Self {
        self.duration = Some(bucket);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search_term().is_none()
            && self.status_term().is_none()
            && self.direction.is_none()
            && self.date_range.is_none()
            && self.duration.is_none()
    }

    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn status_term(&self) -> Option<&str> {
        self.status.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn matches_search(&self, fields: &[&str]) -> bool {
        match self.search_term() {
            Some(needle) => fields.iter().any(|field| field.to_lowercase().contains(&needle)),
            None => true,
        }
    }

    fn matches_status(&self, status: &str) -> bool {
        match self.status_term() {
            Some(wanted) => status.trim().eq_ignore_ascii_case(wanted),
            None => true,
        }
    }

    fn matches_direction(&self, direction: Option<&str>) -> bool {
        self.direction.is_none_or(|wanted| wanted.matches(direction))
    }

    fn matches_date(&self, instant: Option<DateTime<Utc>>) -> bool {
        match (&self.date_range, instant) {
            (None, _) => true,
            (Some(range), Some(instant)) => range.contains(instant),
            (Some(_), None) => false,
        }
    }

    pub fn matches_call(&self, record: &CallRecord) -> bool {
        self.matches_search(&[record.from.as_str(), record.to.as_str(), record.sid.as_str()])
            && self.matches_status(&record.status)
            && self.matches_direction(record.direction.as_deref())
            && self.matches_date(record.started_at())
            && self
                .duration
                .is_none_or(|bucket| DurationBucket::classify(record.duration_secs()) == bucket)
    }

    pub fn matches_message(&self, record: &MessageRecord) -> bool {
        self.matches_search(&[record.from.as_str(), record.to.as_str(), record.sid.as_str(), record.body.as_str()])
            && self.matches_status(&record.status)
            && self.matches_direction(record.direction.as_deref())
            && self.matches_date(record.sent_at())
    }
}

/// Calls matching `filter`, in their original order
pub fn filter_calls(records: &[CallRecord], filter: &HistoryFilter) -> Vec<CallRecord> {
    records.iter().filter(|r| filter.matches_call(r)).cloned().collect()
}

/// Messages matching `filter`, in their original order
pub fn filter_messages(records: &[MessageRecord], filter: &HistoryFilter) -> Vec<MessageRecord> {
    records.iter().filter(|r| filter.matches_message(r)).cloned().collect()
}
