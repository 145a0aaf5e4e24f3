use super::{
    CalendarProviderError, ICalendarProvider, IGoogleOAuth, IMessageSender, SendError,
    SentMessage, REQUIRED_OAUTH_SCOPES,
};
use crate::repos::shared::inmemory_repo::lock;
use crate::repos::GoogleToken;
use chrono::{DateTime, Duration, Utc};
use nudgeme_domain::{CalendarEvent, CalendarEventPatch, NewCalendarEvent, VersionMarker};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Calendar kept in memory. Every edit gets a new `VersionMarker`.
pub struct InMemoryCalendarProvider {
    events: Mutex<Vec<CalendarEvent>>,
    /// Returned by the next calls to `list_events`, one per call
    list_failures: Mutex<VecDeque<CalendarProviderError>>,
    /// Returned by every call until cleared
    outage: Mutex<Option<CalendarProviderError>>,
    list_calls: AtomicUsize,
    revisions: AtomicUsize,
}

impl InMemoryCalendarProvider {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            list_failures: Mutex::new(VecDeque::new()),
            outage: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            revisions: AtomicUsize::new(0),
        }
    }

    /// Adds or replaces an event as is, keeping its version
    pub fn insert(&self, event: CalendarEvent) {
        let mut events = lock(&self.events);
        events.retain(|e| e.id != event.id);
        events.push(event);
    }

    pub fn find(&self, event_id: &str) -> Option<CalendarEvent> {
        lock(&self.events).iter().find(|e| e.id == event_id).cloned()
    }

    pub fn fail_next_list(&self, err: CalendarProviderError) {
        lock(&self.list_failures).push_back(err);
    }

    pub fn set_outage(&self, err: Option<CalendarProviderError>) {
        *lock(&self.outage) = err;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn next_version(&self) -> VersionMarker {
        let revision = self.revisions.fetch_add(1, Ordering::SeqCst) + 1;
        VersionMarker::new(format!("rev-{}", revision))
    }

    fn check_outage(&self) -> Result<(), CalendarProviderError> {
        match lock(&self.outage).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryCalendarProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ICalendarProvider for InMemoryCalendarProvider {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;
        if let Some(err) = lock(&self.list_failures).pop_front() {
            return Err(err);
        }
        let mut events = lock(&self.events)
            .iter()
            .filter(|e| e.start < end && e.end > start)
            .cloned()
            .collect::<Vec<_>>();
        events.sort_by_key(|e| e.start);
        Ok(events)
    }

    async fn create_event(
        &self,
        event: &NewCalendarEvent,
    ) -> Result<CalendarEvent, CalendarProviderError> {
        self.check_outage()?;
        if event.end < event.start {
            return Err(CalendarProviderError::Rejected(
                "The event end must not be before its start".into(),
            ));
        }
        let version = self.next_version();
        let event = CalendarEvent {
            id: format!("event-{}", version.as_str().trim_start_matches("rev-")),
            summary: event.summary.clone(),
            description: event.description.clone(),
            start: event.start,
            end: event.end,
            timezone: event.timezone.clone().unwrap_or_else(|| "UTC".into()),
            status: "confirmed".into(),
            version,
        };
        lock(&self.events).push(event.clone());
        Ok(event)
    }

    async fn update_event(
        &self,
        event_id: &str,
        patch: &CalendarEventPatch,
    ) -> Result<CalendarEvent, CalendarProviderError> {
        self.check_outage()?;
        let version = self.next_version();
        let mut events = lock(&self.events);
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| CalendarProviderError::NotFound(event_id.to_string()))?;
        if let Some(summary) = &patch.summary {
            event.summary = summary.clone();
        }
        if let Some(description) = &patch.description {
            event.description = Some(description.clone());
        }
        if let Some(start) = patch.start {
            event.start = start;
        }
        if let Some(end) = patch.end {
            event.end = end;
        }
        event.version = version;
        Ok(event.clone())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarProviderError> {
        self.check_outage()?;
        let mut events = lock(&self.events);
        let before = events.len();
        events.retain(|e| e.id != event_id);
        if events.len() == before {
            return Err(CalendarProviderError::NotFound(event_id.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum SendBehaviour {
    Deliver,
    Fail(SendError),
    /// Waits before delivering, so the caller may time out first
    Delay(std::time::Duration),
}

/// Records every delivered SMS. Failures can be scripted per attempt.
pub struct InMemoryMessageSender {
    sent: Mutex<Vec<(String, String)>>,
    script: Mutex<VecDeque<SendBehaviour>>,
    attempts: AtomicUsize,
}

impl InMemoryMessageSender {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Behaviour of the next attempts in order, later attempts deliver
    pub fn script<I: IntoIterator<Item = SendBehaviour>>(&self, behaviours: I) {
        lock(&self.script).extend(behaviours);
    }

    /// Delivered messages as `(to, body)`
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|(_, body)| body.clone()).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryMessageSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IMessageSender for InMemoryMessageSender {
    async fn send(&self, to: &str, body: &str) -> Result<SentMessage, SendError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let behaviour = lock(&self.script)
            .pop_front()
            .unwrap_or(SendBehaviour::Deliver);
        match behaviour {
            SendBehaviour::Deliver => {}
            SendBehaviour::Fail(err) => return Err(err),
            SendBehaviour::Delay(delay) => tokio::time::sleep(delay).await,
        }
        lock(&self.sent).push((to.to_string(), body.to_string()));
        Ok(SentMessage {
            id: format!("SM{}", attempt),
            to: to.to_string(),
        })
    }
}

/// Accepts a single authorization code
pub struct InMemoryGoogleOAuth {
    valid_code: String,
}

impl InMemoryGoogleOAuth {
    pub fn new<T: Into<String>>(valid_code: T) -> Self {
        Self {
            valid_code: valid_code.into(),
        }
    }
}

#[async_trait::async_trait]
impl IGoogleOAuth for InMemoryGoogleOAuth {
    fn authorization_url(&self, state: &str) -> Result<String, CalendarProviderError> {
        Ok(format!("https://accounts.example.com/auth?state={}", state))
    }

    async fn exchange_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<GoogleToken, CalendarProviderError> {
        if code != self.valid_code {
            return Err(CalendarProviderError::Unauthorized(
                "invalid_grant".into(),
            ));
        }
        Ok(GoogleToken {
            access_token: format!("access-{}", code),
            refresh_token: Some(format!("refresh-{}", code)),
            scopes: REQUIRED_OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            expires_at: Some(now + Duration::hours(1)),
        })
    }
}
