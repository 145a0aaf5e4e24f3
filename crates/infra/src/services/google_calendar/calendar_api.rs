use super::error_from_status;
use crate::services::CalendarProviderError;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use nudgeme_domain::{CalendarEvent, CalendarEventPatch, NewCalendarEvent, VersionMarker};
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::error;

pub const GOOGLE_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarEventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time: Option<DateTime<Utc>>,
    /// Set instead of `date_time` for all-day events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

impl GoogleCalendarEventDateTime {
    pub fn new(date_time: DateTime<Utc>, time_zone: String) -> Self {
        Self {
            date_time: Some(date_time),
            date: None,
            time_zone: Some(time_zone),
        }
    }

    fn resolve(&self, fallback_tz: &Tz) -> Option<DateTime<Utc>> {
        if let Some(date_time) = self.date_time {
            return Some(date_time);
        }
        let tz = self
            .time_zone
            .as_deref()
            .and_then(|tz| tz.parse::<Tz>().ok())
            .unwrap_or(*fallback_tz);
        let midnight = self.date?.and_hms_opt(0, 0, 0)?;
        tz.from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarEvent {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<GoogleCalendarEventDateTime>,
    #[serde(default)]
    pub end: Option<GoogleCalendarEventDateTime>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl GoogleCalendarEvent {
    /// `None` for entries without usable start and end, e.g. cancelled
    /// instances that only carry their id
    pub fn into_domain(self, fallback_tz: &Tz) -> Option<CalendarEvent> {
        let start_attrs = self.start?;
        let start = start_attrs.resolve(fallback_tz)?;
        let end = self
            .end
            .and_then(|end| end.resolve(fallback_tz))
            .unwrap_or(start);
        let timezone = start_attrs
            .time_zone
            .unwrap_or_else(|| fallback_tz.name().to_string());

        Some(CalendarEvent {
            version: VersionMarker::from_timestamps(self.updated, self.created, start),
            id: self.id,
            summary: self.summary.unwrap_or_else(|| "(no title)".into()),
            description: self.description,
            start,
            end,
            timezone,
            status: self.status.unwrap_or_else(|| "confirmed".into()),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarEventAttributes {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: GoogleCalendarEventDateTime,
    pub end: GoogleCalendarEventDateTime,
}

impl GoogleCalendarEventAttributes {
    pub fn new(event: &NewCalendarEvent, default_tz: &Tz) -> Self {
        let time_zone = event
            .timezone
            .clone()
            .unwrap_or_else(|| default_tz.name().to_string());
        Self {
            summary: event.summary.clone(),
            description: event.description.clone(),
            start: GoogleCalendarEventDateTime::new(event.start, time_zone.clone()),
            end: GoogleCalendarEventDateTime::new(event.end, time_zone),
        }
    }
}

/// Body of a PATCH request, only the supplied fields are changed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarEventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<GoogleCalendarEventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<GoogleCalendarEventDateTime>,
}

impl GoogleCalendarEventPatch {
    pub fn new(patch: &CalendarEventPatch, default_tz: &Tz) -> Self {
        let time_zone = default_tz.name().to_string();
        Self {
            summary: patch.summary.clone(),
            description: patch.description.clone(),
            start: patch
                .start
                .map(|start| GoogleCalendarEventDateTime::new(start, time_zone.clone())),
            end: patch
                .end
                .map(|end| GoogleCalendarEventDateTime::new(end, time_zone.clone())),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsResponse {
    #[serde(default)]
    pub items: Vec<GoogleCalendarEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

pub struct GoogleCalendarRestApi<'a> {
    client: &'a Client,
    base_url: &'a str,
    access_token: String,
}

impl<'a> GoogleCalendarRestApi<'a> {
    pub fn new(client: &'a Client, base_url: &'a str, access_token: String) -> Self {
        Self {
            client,
            base_url,
            access_token,
        }
    }

    fn events_url(&self, calendar_id: &str) -> String {
        let calendar_id: String = url::form_urlencoded::byte_serialize(calendar_id.as_bytes()).collect();
        format!("{}/calendars/{}/events", self.base_url, calendar_id)
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        let event_id: String = url::form_urlencoded::byte_serialize(event_id.as_bytes()).collect();
        format!("{}/{}", self.events_url(calendar_id), event_id)
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, CalendarProviderError> {
        let res = req
            .header("authorization", format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| {
                error!("[Network Error] Google Calendar API error. Error message: {:?}", e);
                CalendarProviderError::Unavailable(e.to_string())
            })?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        error!(
            "[Unexpected Response] Google Calendar API responded with status: {}. Body: {}",
            status, body
        );
        Err(error_from_status(status, body))
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, CalendarProviderError> {
        self.send(req).await?.json::<T>().await.map_err(|e| {
            error!(
                "[Unexpected Response] Google Calendar API returned an unexpected body. Error message: {:?}",
                e
            );
            CalendarProviderError::Rejected(e.to_string())
        })
    }

    pub async fn list(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> Result<ListEventsResponse, CalendarProviderError> {
        let mut query = vec![
            ("timeMin", time_min.to_rfc3339()),
            ("timeMax", time_max.to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", "250".to_string()),
        ];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }
        let req = self.client.get(self.events_url(calendar_id)).query(&query);
        self.send_json(req).await
    }

    pub async fn insert(
        &self,
        calendar_id: &str,
        body: &GoogleCalendarEventAttributes,
    ) -> Result<GoogleCalendarEvent, CalendarProviderError> {
        let req = self.client.post(self.events_url(calendar_id)).json(body);
        self.send_json(req).await
    }

    pub async fn patch(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &GoogleCalendarEventPatch,
    ) -> Result<GoogleCalendarEvent, CalendarProviderError> {
        let req = self
            .client
            .patch(self.event_url(calendar_id, event_id))
            .json(body);
        self.send_json(req).await
    }

    pub async fn remove(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarProviderError> {
        let req = self.client.delete(self.event_url(calendar_id, event_id));
        self.send(req).await.map(|_| ())
    }
}
