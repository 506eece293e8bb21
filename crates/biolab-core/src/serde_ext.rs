//! Lenient deserializers for form-bound payloads.
//!
//! Browser forms submit measurements as strings ("7.2") and dates either as
//! full RFC 3339 timestamps or as plain `YYYY-MM-DD`; both shapes are accepted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn parse_number<E: de::Error>(value: NumberOrText) -> Result<Option<f64>, E> {
    match value {
        NumberOrText::Number(n) => Ok(Some(n)),
        NumberOrText::Text(s) if s.trim().is_empty() => Ok(None),
        NumberOrText::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| E::custom(format!("invalid number: {s}"))),
    }
}

/// `Option<f64>` from a number, a numeric string, an empty string or null
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => parse_number(value),
    }
}

/// Required `f64` from a number or a numeric string
pub fn f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = NumberOrText::deserialize(deserializer)?;
    parse_number(value)?.ok_or_else(|| de::Error::custom("missing number"))
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Timestamp from RFC 3339 or a bare date (midnight UTC)
pub fn datetime_lenient<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_datetime(raw.trim()).ok_or_else(|| de::Error::custom(format!("invalid date: {raw}")))
}

pub fn opt_datetime_lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_datetime(raw.trim())
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid date: {raw}"))),
    }
}
