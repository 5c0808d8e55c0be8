//! Shared value types: timestamps and the derived content mode.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Reserved content type marking a structured-mode body.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// ISO-8601 offset date-time, e.g. `2019-03-04T10:15:30.123+00:00`.
    pub fn to_offset_date_time(self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_offset_date_time())
    }
}

// ---------------------------------------------------------------------------
// Content mode
// ---------------------------------------------------------------------------

/// Wire encoding of an event, derived from the message content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Attributes and data in one JSON envelope forming the body.
    Structured,
    /// Attributes as transport headers, data as the body.
    Binary,
}

impl ContentMode {
    /// `Structured` iff the media type equals [`STRUCTURED_CONTENT_TYPE`].
    ///
    /// Media-type parameters (`; charset=...`) are ignored.
    pub fn of(message: &Message) -> Self {
        let media_type = message
            .content_type()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim);

        match media_type {
            Some(mt) if mt.eq_ignore_ascii_case(STRUCTURED_CONTENT_TYPE) => Self::Structured,
            _ => Self::Binary,
        }
    }
}
