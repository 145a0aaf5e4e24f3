use chrono::{DateTime, Duration, Utc};
use nudgeme_domain::{CalendarEvent, HorizonWindow};
use nudgeme_infra::{CalendarProviderError, ICalendarProvider};
use std::sync::Arc;
use tracing::warn;

/// Fetches the events starting inside the lookahead window. The calendar
/// is queried fresh every time, nothing is cached between cycles.
pub struct EventHorizonScanner {
    calendar: Arc<dyn ICalendarProvider>,
}

impl EventHorizonScanner {
    pub fn new(calendar: Arc<dyn ICalendarProvider>) -> Self {
        Self { calendar }
    }

    pub async fn scan(
        &self,
        now: DateTime<Utc>,
        lookahead: Duration,
    ) -> Result<Vec<CalendarEvent>, CalendarProviderError> {
        let window = HorizonWindow::new(now, lookahead);
        let events = self
            .calendar
            .list_events(window.start, window.end)
            .await
            .map_err(|e| {
                warn!("Unable to fetch upcoming events: {}", e);
                e
            })?;

        // The calendar also returns events that started before `now` but are still running
        Ok(events
            .into_iter()
            .filter(|e| !e.is_cancelled() && window.contains(e.start))
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use nudgeme_domain::VersionMarker;
    use nudgeme_infra::InMemoryCalendarProvider;

    fn event(id: &str, start: DateTime<Utc>, status: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            summary: id.into(),
            description: None,
            start,
            end: start + Duration::hours(1),
            timezone: "UTC".into(),
            status: status.into(),
            version: VersionMarker::new("v1"),
        }
    }

    #[actix_web::test]
    async fn it_only_returns_events_starting_inside_the_window() {
        let now = Utc.with_ymd_and_hms(2021, 2, 21, 12, 0, 0).unwrap();
        let calendar = Arc::new(InMemoryCalendarProvider::new());
        calendar.insert(event("running", now - Duration::minutes(30), "confirmed"));
        calendar.insert(event("now", now, "confirmed"));
        calendar.insert(event("soon", now + Duration::hours(2), "confirmed"));
        calendar.insert(event("cancelled", now + Duration::hours(3), "cancelled"));
        calendar.insert(event("edge", now + Duration::hours(24), "confirmed"));
        calendar.insert(event("later", now + Duration::hours(30), "confirmed"));

        let scanner = EventHorizonScanner::new(calendar);
        let events = scanner.scan(now, Duration::hours(24)).await.unwrap();
        let ids = events.iter().map(|e| e.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["now", "soon"]);
    }

    #[actix_web::test]
    async fn it_surfaces_fetch_failures() {
        let now = Utc.with_ymd_and_hms(2021, 2, 21, 12, 0, 0).unwrap();
        let calendar = Arc::new(InMemoryCalendarProvider::new());
        calendar.fail_next_list(CalendarProviderError::Unavailable("timeout".into()));

        let scanner = EventHorizonScanner::new(calendar);
        assert_eq!(
            scanner.scan(now, Duration::hours(24)).await,
            Err(CalendarProviderError::Unavailable("timeout".into()))
        );
    }
}
