//! Time bucketing for trend queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity of a trend bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    #[default]
    Minute,
    Hour,
    Day,
}

impl Bucket {
    pub fn seconds(self) -> i64 {
        match self {
            Bucket::Minute => 60,
            Bucket::Hour => 3_600,
            Bucket::Day => 86_400,
        }
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" => Ok(Bucket::Minute),
            "hour" => Ok(Bucket::Hour),
            "day" => Ok(Bucket::Day),
            other => Err(format!("unknown bucket: {}", other)),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Bucket::Minute => "minute",
            Bucket::Hour => "hour",
            Bucket::Day => "day",
        };
        f.write_str(name)
    }
}

/// Truncate a timestamp down to the start of its bucket.
///
/// Works on UTC epoch seconds, so day buckets start at midnight UTC.
pub fn truncate_to_bucket(dt: DateTime<Utc>, bucket: Bucket) -> DateTime<Utc> {
    let ts = dt.timestamp();
    let truncated = ts - ts.rem_euclid(bucket.seconds());
    DateTime::from_timestamp(truncated, 0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_to_bucket() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 56).unwrap()
            + chrono::Duration::milliseconds(789);

        assert_eq!(
            truncate_to_bucket(dt, Bucket::Minute),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 0).unwrap()
        );
        assert_eq!(
            truncate_to_bucket(dt, Bucket::Hour),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            truncate_to_bucket(dt, Bucket::Day),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_truncate_is_idempotent_on_boundaries() {
        let boundary = Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap();
        assert_eq!(truncate_to_bucket(boundary, Bucket::Hour), boundary);
        assert_eq!(truncate_to_bucket(boundary, Bucket::Minute), boundary);
    }

    #[test]
    fn test_truncate_before_epoch() {
        let dt = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 30).unwrap();
        assert_eq!(
            truncate_to_bucket(dt, Bucket::Minute),
            Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_bucket_from_str() {
        assert_eq!("HOUR".parse::<Bucket>(), Ok(Bucket::Hour));
        assert_eq!("day".parse::<Bucket>(), Ok(Bucket::Day));
        assert!("week".parse::<Bucket>().is_err());
        assert_eq!(Bucket::default().to_string(), "minute");
    }
}
