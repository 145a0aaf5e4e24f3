use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HaltReasonDTO {
    CalendarUnauthorized,
    MessagingUnauthorized,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleReportDTO {
    pub started_at: DateTime<Utc>,
    pub events_scanned: usize,
    pub reminders_due: usize,
    pub sent: usize,
    pub deferred: usize,
    pub rejected: usize,
    pub pruned: usize,
    /// `completed`, `skipped` or `failed`
    pub outcome: String,
    pub error: Option<String>,
}
