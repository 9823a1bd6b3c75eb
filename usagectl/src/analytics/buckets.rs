//! Time buckets for usage charts.
//!
//! A bucket is a fixed-width interval (hour, day, or week) in a fixed UTC offset. Hour and day
//! buckets start on the hour / at midnight; week buckets start on Monday at midnight. Each bucket
//! is identified by its start (unix seconds) and carries a short label for the chart axis.

use crate::types::NO_DATA_LABEL;
use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Bucket width for usage aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeGranularity {
    #[default]
    Hour,
    Day,
    Week,
}

impl TimeGranularity {
    /// Width of one bucket
    pub fn step(self) -> Duration {
        match self {
            TimeGranularity::Hour => Duration::hours(1),
            TimeGranularity::Day => Duration::days(1),
            TimeGranularity::Week => Duration::weeks(1),
        }
    }

    /// Value of the backend's `default_time` query parameter
    pub fn as_str(self) -> &'static str {
        match self {
            TimeGranularity::Hour => "hour",
            TimeGranularity::Day => "day",
            TimeGranularity::Week => "week",
        }
    }

    /// Round a local time down to the start of its bucket
    fn truncate(self, at: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let local = at.naive_local();
        let naive = match self {
            TimeGranularity::Hour => local.date().and_hms_opt(local.hour(), 0, 0)?,
            TimeGranularity::Day => local.date().and_hms_opt(0, 0, 0)?,
            TimeGranularity::Week => {
                let since_monday = i64::from(local.weekday().num_days_from_monday());
                local.date().checked_sub_signed(Duration::days(since_monday))?.and_hms_opt(0, 0, 0)?
            }
        };
        at.offset().from_local_datetime(&naive).single()
    }

    fn label(self, start: DateTime<FixedOffset>) -> String {
        match self {
            TimeGranularity::Hour => start.format("%m-%d %H:00").to_string(),
            TimeGranularity::Day => start.format("%m-%d").to_string(),
            TimeGranularity::Week => {
                let end = start + Duration::days(6);
                format!("{} - {}", start.format("%m-%d"), end.format("%m-%d"))
            }
        }
    }
}

impl fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(TimeGranularity::Hour),
            "day" => Ok(TimeGranularity::Day),
            "week" => Ok(TimeGranularity::Week),
            other => Err(format!("unknown time granularity '{other}', expected hour, day or week")),
        }
    }
}

/// Identifies one time bucket. Ordered chronologically by start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    /// Unix seconds of the bucket start
    pub start: i64,
    /// Axis label
    pub label: String,
}

impl BucketKey {
    /// Bucket containing `timestamp` (unix seconds), or `None` when the timestamp is outside the
    /// representable calendar range
    pub fn for_timestamp(timestamp: i64, granularity: TimeGranularity, offset: FixedOffset) -> Option<Self> {
        let at = DateTime::from_timestamp(timestamp, 0)?.with_timezone(&offset);
        let start = granularity.truncate(at)?;
        Some(Self {
            start: start.timestamp(),
            label: granularity.label(start),
        })
    }

    /// The bucket immediately before this one
    pub fn previous(&self, granularity: TimeGranularity, offset: FixedOffset) -> Option<Self> {
        let earlier = self.start.checked_sub(granularity.step().num_seconds())?;
        Self::for_timestamp(earlier, granularity, offset)
    }

    /// Stand-in bucket for an empty result
    pub fn no_data() -> Self {
        Self {
            start: 0,
            label: NO_DATA_LABEL.to_string(),
        }
    }
}

impl Ord for BucketKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start.cmp(&other.start).then_with(|| self.label.cmp(&other.label))
    }
}

impl PartialOrd for BucketKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
