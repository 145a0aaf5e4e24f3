use crate::reminders::ReminderDispatcher;
use actix_web::rt::time::{interval_at, Instant};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub fn get_start_delay(now_ts: usize, secs_before_min: usize) -> usize {
    let secs_to_next_minute = 60 - (now_ts / 1000) % 60;
    if secs_to_next_minute > secs_before_min {
        secs_to_next_minute - secs_before_min
    } else {
        secs_to_next_minute + (60 - secs_before_min)
    }
}

/// Runs a reminder cycle on every tick until `shutdown` is cancelled.
/// The first tick happens at the next whole minute.
pub fn start_send_reminders_job(dispatcher: Arc<ReminderDispatcher>, shutdown: CancellationToken) {
    actix_web::rt::spawn(async move {
        let now = dispatcher.now_millis();
        let secs_to_next_run = get_start_delay(now as usize, 0);
        let start = Instant::now() + Duration::from_secs(secs_to_next_run as u64);

        let mut ticker = interval_at(start, dispatcher.scan_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Reminder job stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }
            // Failures are logged by the dispatcher, the next tick starts a fresh cycle
            if let Err(e) = dispatcher.run_cycle().await {
                debug!("Reminder cycle ended early: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use nudgeme_domain::{CalendarEvent, VersionMarker};
    use nudgeme_infra::{InMemoryCalendarProvider, InMemoryMessageSender, NudgemeContext};

    #[test]
    fn start_delay_works() {
        assert_eq!(get_start_delay(50 * 1000, 5), 5);
        assert_eq!(get_start_delay(50 * 1000, 10), 60);
        assert_eq!(get_start_delay(50 * 1000, 15), 55);
        assert_eq!(get_start_delay(60 * 1000, 60), 60);
        assert_eq!(get_start_delay(60 * 1000, 10), 50);
        assert_eq!(get_start_delay(59 * 1000, 0), 1);
        assert_eq!(get_start_delay(59 * 1000, 1), 60);
    }

    #[actix_web::test]
    async fn cancelled_job_sends_nothing() {
        let mut ctx = NudgemeContext::create_inmemory();
        let calendar = Arc::new(InMemoryCalendarProvider::new());
        let sender = Arc::new(InMemoryMessageSender::new());
        let start = Utc::now() + ChronoDuration::minutes(5);
        calendar.insert(CalendarEvent {
            id: "e1".into(),
            summary: "Standup".into(),
            description: None,
            start,
            end: start + ChronoDuration::minutes(30),
            timezone: "UTC".into(),
            status: "confirmed".into(),
            version: VersionMarker::new("v1"),
        });
        ctx.services.calendar = calendar.clone();
        ctx.services.messages = sender.clone();

        let shutdown = CancellationToken::new();
        start_send_reminders_job(Arc::new(ReminderDispatcher::new(ctx)), shutdown.clone());
        shutdown.cancel();
        actix_web::rt::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(calendar.list_calls(), 0);
        assert_eq!(sender.attempts(), 0);
    }
}
