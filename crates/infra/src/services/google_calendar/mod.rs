pub mod auth_provider;
mod calendar_api;

use super::{CalendarProviderError, ICalendarProvider};
use crate::config::GoogleConfig;
use crate::repos::IGoogleTokenRepo;
use crate::system::ISys;
use auth_provider::GoogleOAuthEndpoints;
use calendar_api::{
    GoogleCalendarEventAttributes, GoogleCalendarEventPatch, GoogleCalendarRestApi,
    GOOGLE_API_BASE_URL,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use nudgeme_domain::{CalendarEvent, CalendarEventPatch, NewCalendarEvent};
use reqwest::{Client, StatusCode};
use std::sync::Arc;

// https://developers.google.com/calendar/v3/reference/events

/// Maps a non successful Google response to the error kinds the rest of the app acts on
pub(crate) fn error_from_status(status: StatusCode, body: String) -> CalendarProviderError {
    let msg = format!("{}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CalendarProviderError::Unauthorized(msg),
        StatusCode::NOT_FOUND | StatusCode::GONE => CalendarProviderError::NotFound(msg),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            CalendarProviderError::Unavailable(msg)
        }
        s if s.is_server_error() => CalendarProviderError::Unavailable(msg),
        _ => CalendarProviderError::Rejected(msg),
    }
}

pub struct GoogleCalendarProvider {
    client: Client,
    config: GoogleConfig,
    timezone: Tz,
    tokens: Arc<dyn IGoogleTokenRepo>,
    sys: Arc<dyn ISys>,
    api_base_url: String,
    oauth: GoogleOAuthEndpoints,
}

impl GoogleCalendarProvider {
    pub fn new(
        config: GoogleConfig,
        timezone: Tz,
        tokens: Arc<dyn IGoogleTokenRepo>,
        sys: Arc<dyn ISys>,
    ) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            config,
            timezone,
            tokens,
            sys,
            api_base_url: GOOGLE_API_BASE_URL.into(),
            oauth: GoogleOAuthEndpoints::default(),
        }
    }

    /// Points the provider at other hosts, used to test against mock servers
    pub fn with_endpoints(mut self, api_base_url: String, oauth: GoogleOAuthEndpoints) -> Self {
        self.api_base_url = api_base_url;
        self.oauth = oauth;
        self
    }

    async fn api(&self) -> Result<GoogleCalendarRestApi<'_>, CalendarProviderError> {
        let access_token = auth_provider::get_access_token(
            &self.client,
            &self.oauth,
            &self.config,
            self.tokens.as_ref(),
            self.sys.now(),
        )
        .await?;
        Ok(GoogleCalendarRestApi::new(
            &self.client,
            &self.api_base_url,
            access_token,
        ))
    }
}

#[async_trait::async_trait]
impl ICalendarProvider for GoogleCalendarProvider {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarProviderError> {
        let api = self.api().await?;
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = api
                .list(&self.config.calendar_id, start, end, page_token.as_deref())
                .await?;
            events.extend(
                page.items
                    .into_iter()
                    .filter_map(|e| e.into_domain(&self.timezone)),
            );
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(events)
    }

    async fn create_event(
        &self,
        event: &NewCalendarEvent,
    ) -> Result<CalendarEvent, CalendarProviderError> {
        let body = GoogleCalendarEventAttributes::new(event, &self.timezone);
        self.api()
            .await?
            .insert(&self.config.calendar_id, &body)
            .await?
            .into_domain(&self.timezone)
            .ok_or_else(|| {
                CalendarProviderError::Rejected("Created event has no start time".into())
            })
    }

    async fn update_event(
        &self,
        event_id: &str,
        patch: &CalendarEventPatch,
    ) -> Result<CalendarEvent, CalendarProviderError> {
        let body = GoogleCalendarEventPatch::new(patch, &self.timezone);
        self.api()
            .await?
            .patch(&self.config.calendar_id, event_id, &body)
            .await?
            .into_domain(&self.timezone)
            .ok_or_else(|| {
                CalendarProviderError::Rejected("Updated event has no start time".into())
            })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarProviderError> {
        self.api()
            .await?
            .remove(&self.config.calendar_id, event_id)
            .await
    }
}
