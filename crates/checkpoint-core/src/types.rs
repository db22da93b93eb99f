//! Wire types shared across management API responses.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

/// Path prefix of the management web API, relative to the server URL.
pub const WEB_API_PREFIX: &str = "web_api/";

/// Header carrying the session id on authenticated calls.
pub const SESSION_HEADER: &str = "X-chkp-sid";

/// Task status the server reports while a task is still running.
pub const TASK_IN_PROGRESS: &str = "in progress";

/// A server timestamp carried in two forms.
///
/// The `iso-8601` string is kept verbatim (the server drops the seconds, so
/// it is not valid ISO 8601). The `posix` number is POSIX seconds in login
/// responses and milliseconds nearly everywhere else. A value that fits in an
/// `i32` is read as seconds; anything else is read as milliseconds and
/// rounded to the nearest second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualFormatTimestamp {
    /// The human-readable form, as sent.
    pub iso8601: String,
    /// The decoded instant.
    pub posix: DateTime<Utc>,
}

#[derive(Deserialize, Serialize)]
struct RawTimestamp {
    #[serde(rename = "iso-8601")]
    iso8601: String,
    posix: Number,
}

/// Decodes the ambiguous numeric form of a [`DualFormatTimestamp`].
///
/// Returns `None` when the number cannot be represented as an instant.
#[must_use]
pub fn decode_posix(value: &Number) -> Option<DateTime<Utc>> {
    if let Some(seconds) = value.as_i64().and_then(|v| i32::try_from(v).ok()) {
        return DateTime::from_timestamp(i64::from(seconds), 0);
    }

    let millis = value.as_f64()?;
    let seconds = (millis / 1000.0).round();
    if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    DateTime::from_timestamp(seconds as i64, 0)
}

impl<'de> Deserialize<'de> for DualFormatTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawTimestamp::deserialize(deserializer)?;
        let posix = decode_posix(&raw.posix)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", raw.posix)))?;
        Ok(Self {
            iso8601: raw.iso8601,
            posix,
        })
    }
}

impl Serialize for DualFormatTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        RawTimestamp {
            iso8601: self.iso8601.clone(),
            posix: Number::from(self.posix.timestamp_millis()),
        }
        .serialize(serializer)
    }
}
