mod google_calendar;
mod inmemory;
mod twilio;

use chrono::{DateTime, Utc};
use nudgeme_domain::{CalendarEvent, CalendarEventPatch, NewCalendarEvent};
use thiserror::Error;

use crate::repos::GoogleToken;
pub use google_calendar::auth_provider::{
    GoogleOAuthClient, GoogleOAuthEndpoints, REQUIRED_OAUTH_SCOPES,
};
pub use google_calendar::GoogleCalendarProvider;
pub use inmemory::{
    InMemoryCalendarProvider, InMemoryGoogleOAuth, InMemoryMessageSender, SendBehaviour,
};
pub use twilio::TwilioMessageSender;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarProviderError {
    /// Network failures, timeouts and 5xx responses
    #[error("The calendar is unavailable: {0}")]
    Unavailable(String),
    /// Missing, revoked or unrefreshable credentials
    #[error("The calendar rejected our credentials: {0}")]
    Unauthorized(String),
    /// The calendar refused the request itself
    #[error("The calendar rejected the request: {0}")]
    Rejected(String),
    #[error("The calendar event with id: {0} was not found")]
    NotFound(String),
}

/// The external calendar owning the `CalendarEvent`s
#[async_trait::async_trait]
pub trait ICalendarProvider: Send + Sync {
    /// Events overlapping `[start, end)`, recurring events expanded into single instances
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarProviderError>;
    async fn create_event(
        &self,
        event: &NewCalendarEvent,
    ) -> Result<CalendarEvent, CalendarProviderError>;
    async fn update_event(
        &self,
        event_id: &str,
        patch: &CalendarEventPatch,
    ) -> Result<CalendarEvent, CalendarProviderError>;
    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarProviderError>;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SendError {
    /// Worth retrying: network failures, throttling and 5xx responses
    #[error("Transient failure sending SMS: {0}")]
    Transient(String),
    #[error("The SMS provider rejected our credentials: {0}")]
    Unauthorized(String),
    /// The message itself was refused, e.g. an invalid number
    #[error("The SMS provider rejected the message: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    /// Provider id of the message, e.g. the Twilio `sid`
    pub id: String,
    pub to: String,
}

/// Outbound SMS transport
#[async_trait::async_trait]
pub trait IMessageSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<SentMessage, SendError>;
}

/// Authorization code flow connecting the Google account
#[async_trait::async_trait]
pub trait IGoogleOAuth: Send + Sync {
    /// Consent screen url carrying `state`
    fn authorization_url(&self, state: &str) -> Result<String, CalendarProviderError>;
    async fn exchange_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<GoogleToken, CalendarProviderError>;
}
