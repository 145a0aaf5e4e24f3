use chrono::{DateTime, Utc};
use nudgeme_domain::CalendarEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventDTO {
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub status: String,
    pub version: String,
}

impl CalendarEventDTO {
    pub fn new(event: CalendarEvent) -> Self {
        Self {
            version: event.version.to_string(),
            id: event.id,
            summary: event.summary,
            description: event.description,
            start_time: event.start,
            end_time: event.end,
            timezone: event.timezone,
            status: event.status,
        }
    }
}
