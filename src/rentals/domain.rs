use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use crate::validation::ValidationError;

/// Body of `POST /api/rentals`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewRental {
    pub item_id: i64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end_at: DateTime<Utc>,
}

impl NewRental {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.end_at <= self.start_at {
            return Err(ValidationError::InvalidPeriod);
        }
        Ok(())
    }

    /// Length of the rental period in nanoseconds.
    pub fn duration_ns(&self) -> i128 {
        let d = self.end_at - self.start_at;
        i128::from(d.num_seconds()) * 1_000_000_000 + i128::from(d.subsec_nanos())
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// RFC 3339, or a timestamp without offset which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}
