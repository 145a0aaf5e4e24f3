use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque change token reported by the calendar. It changes whenever
/// the time or content of a `CalendarEvent` is edited.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionMarker(String);

impl VersionMarker {
    pub fn new<T: Into<String>>(marker: T) -> Self {
        Self(marker.into())
    }

    /// Derives the marker the same way for every provider: last modification
    /// time, then creation time, then the start time itself.
    pub fn from_timestamps(
        updated: Option<DateTime<Utc>>,
        created: Option<DateTime<Utc>>,
        start: DateTime<Utc>,
    ) -> Self {
        let ts = updated.or(created).unwrap_or(start);
        Self(ts.to_rfc3339())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transient copy of an event owned by the external calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA timezone name the calendar reports for the event
    pub timezone: String,
    pub status: String,
    pub version: VersionMarker,
}

impl CalendarEvent {
    pub const CANCELLED_STATUS: &'static str = "cancelled";

    pub fn is_cancelled(&self) -> bool {
        self.status == Self::CANCELLED_STATUS
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCalendarEvent {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: Option<String>,
    /// Overrides the configured timezone for start and end
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarEventPatch {
    pub summary: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl CalendarEventPatch {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.description.is_none()
    }
}
