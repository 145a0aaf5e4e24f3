use super::scanner::EventHorizonScanner;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use nudgeme_domain::{
    decide, message::reminder_text, CalendarEvent, DecisionOutcome, HorizonWindow,
    MessageStyle, ReminderKey, ReminderRecord, VersionMarker,
};
use nudgeme_infra::{CalendarProviderError, LedgerError, NudgemeContext, SendError, SentMessage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

/// A failed send is retried once right away, after that it waits for the next cycle
const SEND_ATTEMPTS: u32 = 2;
const FLUSH_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Cleared by the first cycle whose scan succeeds again
    CalendarUnauthorized,
    /// Cleared by restarting with new credentials
    MessagingUnauthorized,
}

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Reminders are halted: {0:?}")]
    Halted(HaltReason),
    #[error("Unable to scan the calendar: {0}")]
    Scan(CalendarProviderError),
    #[error("The calendar rejected our credentials: {0}")]
    CalendarUnauthorized(String),
    #[error("The SMS provider rejected our credentials: {0}")]
    MessagingUnauthorized(String),
    #[error("Unable to persist the reminder ledger: {0}")]
    Persistence(LedgerError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed,
    /// Nothing was attempted, e.g. the calendar could not be reached
    Skipped(String),
    Failed(String),
}

/// Summary of one scan, decide, send and persist cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub events_scanned: usize,
    pub reminders_due: usize,
    pub sent: usize,
    pub deferred: usize,
    pub rejected: usize,
    pub pruned: usize,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            events_scanned: 0,
            reminders_due: 0,
            sent: 0,
            deferred: 0,
            rejected: 0,
            pruned: 0,
            outcome: CycleOutcome::Completed,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatcherStatus {
    pub halted: Option<HaltReason>,
    pub last_cycle: Option<CycleReport>,
}

struct DueReminder {
    key: ReminderKey,
    version: VersionMarker,
    text: String,
}

enum SendOutcome {
    Sent(SentMessage),
    Deferred(String),
    Rejected(String),
    Unauthorized(String),
}

/// Runs reminder cycles against the context's calendar, SMS sender and ledger.
///
/// A reminder is recorded in the ledger only after the SMS provider confirmed
/// the send, and a recorded reminder is never sent again for the same event
/// version. Only one cycle runs at a time.
pub struct ReminderDispatcher {
    ctx: NudgemeContext,
    scanner: EventHorizonScanner,
    style: MessageStyle,
    cycle_lock: tokio::sync::Mutex<()>,
    status: Mutex<DispatcherStatus>,
    /// Reminders refused by the SMS provider are not attempted again for the same version
    rejected: Mutex<HashSet<(ReminderKey, VersionMarker)>>,
}

impl ReminderDispatcher {
    pub fn new(ctx: NudgemeContext) -> Self {
        let scanner = EventHorizonScanner::new(ctx.services.calendar.clone());
        let style = MessageStyle::from_personality(&ctx.config.personality_prompt);
        Self {
            ctx,
            scanner,
            style,
            cycle_lock: tokio::sync::Mutex::new(()),
            status: Mutex::new(DispatcherStatus::default()),
            rejected: Mutex::new(HashSet::new()),
        }
    }

    pub fn status(&self) -> DispatcherStatus {
        self.lock_status().clone()
    }

    /// Sent reminders whose ledger records are not durable yet
    pub fn pending_ledger_writes(&self) -> usize {
        self.ctx.repos.reminder_ledger.pending()
    }

    pub fn scan_interval(&self) -> std::time::Duration {
        self.ctx.config.reminders.scan_interval
    }

    pub fn now_millis(&self) -> i64 {
        self.ctx.sys.get_timestamp_millis()
    }

    fn lock_status(&self) -> MutexGuard<'_, DispatcherStatus> {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_rejected(&self) -> MutexGuard<'_, HashSet<(ReminderKey, VersionMarker)>> {
        self.rejected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn halted(&self) -> Option<HaltReason> {
        self.lock_status().halted
    }

    fn set_halted(&self, reason: Option<HaltReason>) {
        self.lock_status().halted = reason;
    }

    /// Runs one cycle at the current time of the context clock
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let _cycle = self.cycle_lock.lock().await;
        let now = self.ctx.sys.now();
        let mut report = CycleReport::new(now);

        let res = self.dispatch(now, &mut report).await;
        report.outcome = match &res {
            Ok(()) => CycleOutcome::Completed,
            Err(e @ CycleError::Halted(_)) | Err(e @ CycleError::Scan(_)) => {
                CycleOutcome::Skipped(e.to_string())
            }
            Err(e) => CycleOutcome::Failed(e.to_string()),
        };
        log_report(&report);
        self.lock_status().last_cycle = Some(report.clone());

        res.map(|_| report)
    }

    async fn dispatch(&self, now: DateTime<Utc>, report: &mut CycleReport) -> Result<(), CycleError> {
        // Records left over from a failed flush, retried even while halted
        let ledger = &self.ctx.repos.reminder_ledger;
        if ledger.pending() > 0 {
            if let Err(e) = ledger.flush().await {
                warn!(
                    pending = ledger.pending(),
                    "Unable to persist reminder records from an earlier cycle: {}", e
                );
            }
        }

        let halted = self.halted();
        if halted == Some(HaltReason::MessagingUnauthorized) {
            return Err(CycleError::Halted(HaltReason::MessagingUnauthorized));
        }

        let settings = &self.ctx.config.reminders;
        let events = match self.scanner.scan(now, settings.lookahead).await {
            Ok(events) => events,
            Err(CalendarProviderError::Unauthorized(msg)) => {
                if halted == Some(HaltReason::CalendarUnauthorized) {
                    return Err(CycleError::Halted(HaltReason::CalendarUnauthorized));
                }
                error!(
                    alert = true,
                    "Calendar credentials were rejected, reminders are halted until the Google account is connected again: {}",
                    msg
                );
                self.set_halted(Some(HaltReason::CalendarUnauthorized));
                return Err(CycleError::CalendarUnauthorized(msg));
            }
            Err(e) => return Err(CycleError::Scan(e)),
        };
        if halted == Some(HaltReason::CalendarUnauthorized) {
            info!("Calendar access restored, resuming reminders");
            self.set_halted(None);
        }
        report.events_scanned = events.len();

        let due = self.due_reminders(now, &events);
        report.reminders_due = due.len();

        let mut messaging_unauthorized = None;
        for (reminder, outcome) in self.send_all(due).await {
            match outcome {
                SendOutcome::Sent(sent) => {
                    debug!(reminder = %reminder.key, message_id = %sent.id, "Reminder sent");
                    let record = ReminderRecord {
                        version: reminder.version,
                        dispatched_at: self.ctx.sys.now(),
                    };
                    ledger.record(&reminder.key, record);
                    report.sent += 1;
                }
                SendOutcome::Deferred(reason) => {
                    warn!(reminder = %reminder.key, "Reminder deferred to the next cycle: {}", reason);
                    report.deferred += 1;
                }
                SendOutcome::Rejected(reason) => {
                    warn!(reminder = %reminder.key, "Reminder rejected by the SMS provider: {}", reason);
                    self.lock_rejected().insert((reminder.key, reminder.version));
                    report.rejected += 1;
                }
                SendOutcome::Unauthorized(reason) => {
                    messaging_unauthorized.get_or_insert(reason);
                    report.deferred += 1;
                }
            }
        }

        if let Some(msg) = &messaging_unauthorized {
            error!(
                alert = true,
                "SMS credentials were rejected, reminders are halted until restart: {}", msg
            );
            self.set_halted(Some(HaltReason::MessagingUnauthorized));
        }

        report.pruned = ledger.prune_dispatched_before(now - settings.ledger_retention);
        if let Err(e) = self.flush_ledger().await {
            error!(
                pending = ledger.pending(),
                "Unable to persist the reminder ledger, records stay in memory: {}", e
            );
            return Err(CycleError::Persistence(e));
        }

        match messaging_unauthorized {
            Some(msg) => Err(CycleError::MessagingUnauthorized(msg)),
            None => Ok(()),
        }
    }

    fn due_reminders(&self, now: DateTime<Utc>, events: &[CalendarEvent]) -> Vec<DueReminder> {
        let settings = &self.ctx.config.reminders;
        let window = HorizonWindow::new(now, settings.lookahead);
        let ledger = &self.ctx.repos.reminder_ledger;

        let mut due = Vec::new();
        for event in events {
            for offset in &settings.offsets {
                let key = ReminderKey::new(event, offset);
                let record = ledger.lookup(&key);
                if decide(&window, event, offset, record.as_ref()) == DecisionOutcome::Fire {
                    due.push(DueReminder {
                        key,
                        version: event.version.clone(),
                        text: reminder_text(&event.summary, offset, self.style),
                    });
                }
            }
        }

        let mut rejected = self.lock_rejected();
        rejected.retain(|(key, version)| {
            due.iter()
                .any(|r| r.key == *key && r.version == *version)
        });
        due.retain(|r| !rejected.contains(&(r.key.clone(), r.version.clone())));
        due
    }

    async fn send_all(&self, due: Vec<DueReminder>) -> Vec<(DueReminder, SendOutcome)> {
        let settings = &self.ctx.config.reminders;
        // No new send starts after the deadline, sends in flight are not cancelled
        let deadline = Instant::now() + settings.cycle_deadline();
        let abort = AtomicBool::new(false);
        let abort = &abort;

        stream::iter(due)
            .map(|reminder| async move {
                let outcome = self.send_reminder(&reminder, abort, deadline).await;
                (reminder, outcome)
            })
            .buffer_unordered(settings.send_concurrency.max(1))
            .collect()
            .await
    }

    async fn send_reminder(
        &self,
        reminder: &DueReminder,
        abort: &AtomicBool,
        deadline: Instant,
    ) -> SendOutcome {
        let settings = &self.ctx.config.reminders;
        let to = &self.ctx.config.twilio.user_phone_number;

        let mut last_failure = String::new();
        for attempt in 1..=SEND_ATTEMPTS {
            if abort.load(Ordering::SeqCst) {
                return SendOutcome::Deferred("SMS credentials were rejected".into());
            }
            if Instant::now() >= deadline {
                return SendOutcome::Deferred("The cycle deadline passed".into());
            }

            let send = self.ctx.services.messages.send(to, &reminder.text);
            match timeout(settings.send_timeout, send).await {
                Ok(Ok(sent)) => return SendOutcome::Sent(sent),
                Ok(Err(SendError::Transient(msg))) => last_failure = msg,
                Ok(Err(SendError::Rejected(msg))) => return SendOutcome::Rejected(msg),
                Ok(Err(SendError::Unauthorized(msg))) => {
                    abort.store(true, Ordering::SeqCst);
                    return SendOutcome::Unauthorized(msg);
                }
                Err(_) => {
                    last_failure = format!("Timed out after {:?}", settings.send_timeout)
                }
            }
            debug!(reminder = %reminder.key, attempt, "Send attempt failed: {}", last_failure);
        }
        SendOutcome::Deferred(last_failure)
    }

    async fn flush_ledger(&self) -> Result<(), LedgerError> {
        let attempts = self.ctx.config.reminders.flush_attempts.max(1) as u32;
        let mut attempt = 1;
        loop {
            match self.ctx.repos.reminder_ledger.flush().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    warn!(attempt, "Unable to persist the reminder ledger, retrying: {}", e);
                    tokio::time::sleep(FLUSH_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn log_report(report: &CycleReport) {
    if report.sent > 0 || report.deferred > 0 || report.rejected > 0 {
        info!(
            events_scanned = report.events_scanned,
            reminders_due = report.reminders_due,
            sent = report.sent,
            deferred = report.deferred,
            rejected = report.rejected,
            pruned = report.pruned,
            outcome = ?report.outcome,
            "Reminder cycle finished"
        );
    } else {
        debug!(
            events_scanned = report.events_scanned,
            pruned = report.pruned,
            outcome = ?report.outcome,
            "Reminder cycle finished"
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone};
    use nudgeme_domain::CalendarEventPatch;
    use nudgeme_infra::{
        ICalendarProvider, IReminderLedger, ISys, InMemoryCalendarProvider,
        InMemoryMessageSender, InMemoryReminderLedger, SendBehaviour,
    };
    use std::sync::Arc;

    /// Clock that tests move forward by hand
    struct TestClock(Mutex<DateTime<Utc>>);

    impl TestClock {
        fn set(&self, now: DateTime<Utc>) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl ISys for TestClock {
        fn get_timestamp_millis(&self) -> i64 {
            self.0.lock().unwrap().timestamp_millis()
        }
    }

    struct TestEnv {
        ctx: NudgemeContext,
        clock: Arc<TestClock>,
        calendar: Arc<InMemoryCalendarProvider>,
        sender: Arc<InMemoryMessageSender>,
        ledger: Arc<InMemoryReminderLedger>,
    }

    impl TestEnv {
        fn new(now: DateTime<Utc>) -> Self {
            Self::with_ledger(now, InMemoryReminderLedger::new())
        }

        fn with_ledger(now: DateTime<Utc>, ledger: InMemoryReminderLedger) -> Self {
            let mut ctx = NudgemeContext::create_inmemory();
            let clock = Arc::new(TestClock(Mutex::new(now)));
            let calendar = Arc::new(InMemoryCalendarProvider::new());
            let sender = Arc::new(InMemoryMessageSender::new());
            let ledger = Arc::new(ledger);
            ctx.sys = clock.clone();
            ctx.services.calendar = calendar.clone();
            ctx.services.messages = sender.clone();
            ctx.repos.reminder_ledger = ledger.clone();
            Self {
                ctx,
                clock,
                calendar,
                sender,
                ledger,
            }
        }

        fn dispatcher(&self) -> ReminderDispatcher {
            ReminderDispatcher::new(self.ctx.clone())
        }

        async fn cycle_at(
            &self,
            dispatcher: &ReminderDispatcher,
            now: DateTime<Utc>,
        ) -> Result<CycleReport, CycleError> {
            self.clock.set(now);
            dispatcher.run_cycle().await
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 2, 21, 10, 0, 0).unwrap()
    }

    fn event(id: &str, start: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            summary: "Standup".into(),
            description: None,
            start,
            end: start + Duration::minutes(30),
            timezone: "UTC".into(),
            status: "confirmed".into(),
            version: VersionMarker::new("v1"),
        }
    }

    #[actix_web::test]
    async fn each_reminder_is_sent_once_at_its_offset() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        let dispatcher = env.dispatcher();

        let report = env.cycle_at(&dispatcher, t0()).await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(
            env.sender.bodies(),
            vec!["⏰ Heads up! 'Standup' starts in ~2 hours.".to_string()]
        );

        for minutes in [1, 5, 60, 109] {
            let report = env
                .cycle_at(&dispatcher, t0() + Duration::minutes(minutes))
                .await
                .unwrap();
            assert_eq!(report.sent, 0, "at T+{}m", minutes);
        }

        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(110))
            .await
            .unwrap();
        assert_eq!(report.sent, 1);
        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(111))
            .await
            .unwrap();
        assert_eq!(report.sent, 0);

        assert_eq!(
            env.sender.bodies(),
            vec![
                "⏰ Heads up! 'Standup' starts in ~2 hours.".to_string(),
                "🚀 Almost go time! 'Standup' kicks off in 10 minutes.".to_string()
            ]
        );
        assert_eq!(
            env.sender.sent()[0].0,
            env.ctx.config.twilio.user_phone_number
        );
        assert_eq!(env.ledger.pending(), 0);
    }

    #[actix_web::test]
    async fn reminders_fire_at_their_marks() {
        let env = TestEnv::new(t0());
        env.calendar
            .insert(event("e1", t0() + Duration::minutes(125)));
        let dispatcher = env.dispatcher();

        let expected_sent = [(0, 0), (5, 1), (60, 1), (115, 2), (120, 2), (124, 2)];
        for (minutes, sent) in expected_sent {
            env.cycle_at(&dispatcher, t0() + Duration::minutes(minutes))
                .await
                .unwrap();
            assert_eq!(env.sender.attempts(), sent, "at T+{}m", minutes);
        }
    }

    #[actix_web::test]
    async fn nothing_is_resent_after_a_restart() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        env.cycle_at(&env.dispatcher(), t0()).await.unwrap();
        assert_eq!(env.sender.attempts(), 1);

        let restarted = TestEnv::with_ledger(
            t0(),
            InMemoryReminderLedger::from_document(env.ledger.persisted()),
        );
        restarted
            .calendar
            .insert(event("e1", t0() + Duration::hours(2)));
        let report = restarted
            .cycle_at(&restarted.dispatcher(), t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(report.reminders_due, 0);
        assert_eq!(restarted.sender.attempts(), 0);
    }

    #[actix_web::test]
    async fn edited_events_are_reminded_again() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        let dispatcher = env.dispatcher();
        env.cycle_at(&dispatcher, t0()).await.unwrap();

        // Moved one hour later, the 2h reminder is due again at T+1h
        let patch = CalendarEventPatch {
            start: Some(t0() + Duration::hours(3)),
            end: Some(t0() + Duration::hours(4)),
            ..Default::default()
        };
        env.calendar.update_event("e1", &patch).await.unwrap();

        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(report.sent, 0);
        let report = env
            .cycle_at(&dispatcher, t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(report.sent, 1);
        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(61))
            .await
            .unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(env.sender.bodies().len(), 2);
    }

    #[actix_web::test]
    async fn late_reminders_fire_together() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::minutes(5)));
        env.calendar.insert(event("far", t0() + Duration::hours(30)));
        let dispatcher = env.dispatcher();

        let report = env.cycle_at(&dispatcher, t0()).await.unwrap();
        assert_eq!(report.events_scanned, 1);
        assert_eq!(report.sent, 2);

        // Started events leave the window and are never reminded again
        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(6))
            .await
            .unwrap();
        assert_eq!(report.events_scanned, 0);
        assert_eq!(env.sender.attempts(), 2);
    }

    #[actix_web::test]
    async fn transient_failures_are_retried_once_then_deferred() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        let dispatcher = env.dispatcher();

        env.sender.script(vec![
            SendBehaviour::Fail(SendError::Transient("503".into())),
            SendBehaviour::Fail(SendError::Transient("503".into())),
        ]);
        let report = env.cycle_at(&dispatcher, t0()).await.unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(report.deferred, 1);
        assert_eq!(env.sender.attempts(), 2);
        assert!(env.ledger.persisted().is_empty());

        env.sender
            .script(vec![SendBehaviour::Fail(SendError::Transient("503".into()))]);
        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(env.sender.attempts(), 4);
        assert_eq!(env.sender.bodies().len(), 1);
    }

    #[actix_web::test]
    async fn timed_out_sends_are_deferred() {
        let mut env = TestEnv::new(t0());
        env.ctx.config.reminders.send_timeout = std::time::Duration::from_millis(20);
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        let dispatcher = env.dispatcher();

        env.sender.script(vec![
            SendBehaviour::Delay(std::time::Duration::from_millis(500)),
            SendBehaviour::Delay(std::time::Duration::from_millis(500)),
        ]);
        let report = env.cycle_at(&dispatcher, t0()).await.unwrap();
        assert_eq!(report.deferred, 1);
        assert_eq!(env.sender.attempts(), 2);
        assert!(env.sender.sent().is_empty());
        assert_eq!(env.ledger.pending(), 0);
    }

    #[actix_web::test]
    async fn no_sends_start_after_the_cycle_deadline() {
        let mut env = TestEnv::new(t0());
        env.ctx.config.reminders.scan_interval = std::time::Duration::from_secs(1);
        env.ctx.config.reminders.send_concurrency = 1;
        env.calendar.insert(event("e1", t0() + Duration::minutes(30)));
        env.calendar.insert(event("e2", t0() + Duration::minutes(40)));
        let dispatcher = env.dispatcher();

        env.sender
            .script(vec![SendBehaviour::Delay(std::time::Duration::from_millis(1100))]);
        let report = env.cycle_at(&dispatcher, t0()).await.unwrap();
        // The slow send completes and is recorded, the second one waits for the next cycle
        assert_eq!(report.sent, 1);
        assert_eq!(report.deferred, 1);
        assert_eq!(env.sender.attempts(), 1);

        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(report.sent, 1);
    }

    #[actix_web::test]
    async fn rejected_sends_are_not_retried() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        let dispatcher = env.dispatcher();

        env.sender
            .script(vec![SendBehaviour::Fail(SendError::Rejected("invalid number".into()))]);
        let report = env.cycle_at(&dispatcher, t0()).await.unwrap();
        assert_eq!(report.rejected, 1);

        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(report.reminders_due, 0);
        assert_eq!(env.sender.attempts(), 1);
    }

    #[actix_web::test]
    async fn unauthorized_sends_halt_until_restart() {
        let mut env = TestEnv::new(t0());
        env.ctx.config.reminders.send_concurrency = 1;
        env.calendar.insert(event("e1", t0() + Duration::hours(1)));
        env.calendar.insert(event("e2", t0() + Duration::hours(1)));
        let dispatcher = env.dispatcher();

        env.sender
            .script(vec![SendBehaviour::Fail(SendError::Unauthorized("401".into()))]);
        let res = env.cycle_at(&dispatcher, t0()).await;
        assert!(matches!(res, Err(CycleError::MessagingUnauthorized(_))));
        // The second reminder was never attempted
        assert_eq!(env.sender.attempts(), 1);
        assert_eq!(
            dispatcher.status().halted,
            Some(HaltReason::MessagingUnauthorized)
        );

        let list_calls = env.calendar.list_calls();
        let res = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(1))
            .await;
        assert!(matches!(
            res,
            Err(CycleError::Halted(HaltReason::MessagingUnauthorized))
        ));
        assert_eq!(env.calendar.list_calls(), list_calls);
        assert_eq!(env.sender.attempts(), 1);
        assert!(matches!(
            dispatcher.status().last_cycle.map(|c| c.outcome),
            Some(CycleOutcome::Skipped(_))
        ));
    }

    #[actix_web::test]
    async fn halted_cycles_still_flush_leftover_records() {
        let mut env = TestEnv::new(t0());
        env.ctx.config.reminders.send_concurrency = 1;
        env.calendar.insert(event("e1", t0() + Duration::hours(1)));
        env.calendar.insert(event("e2", t0() + Duration::hours(1)));
        let dispatcher = env.dispatcher();

        env.sender.script(vec![
            SendBehaviour::Deliver,
            SendBehaviour::Fail(SendError::Unauthorized("401".into())),
        ]);
        env.ledger.fail_next_flushes(3);
        let res = env.cycle_at(&dispatcher, t0()).await;
        assert!(matches!(res, Err(CycleError::Persistence(_))));
        assert_eq!(
            dispatcher.status().halted,
            Some(HaltReason::MessagingUnauthorized)
        );
        assert_eq!(dispatcher.pending_ledger_writes(), 1);

        let res = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(1))
            .await;
        assert!(matches!(
            res,
            Err(CycleError::Halted(HaltReason::MessagingUnauthorized))
        ));
        assert_eq!(dispatcher.pending_ledger_writes(), 0);
        assert!(env.ledger.persisted().contains_key("e1"));
        assert_eq!(env.sender.attempts(), 2);
    }

    #[actix_web::test]
    async fn calendar_auth_failures_halt_until_access_is_restored() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        let dispatcher = env.dispatcher();

        env.calendar
            .set_outage(Some(CalendarProviderError::Unauthorized("401".into())));
        let res = env.cycle_at(&dispatcher, t0()).await;
        assert!(matches!(res, Err(CycleError::CalendarUnauthorized(_))));
        assert_eq!(
            dispatcher.status().halted,
            Some(HaltReason::CalendarUnauthorized)
        );

        // Still halted, but every cycle checks the calendar
        let res = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(1))
            .await;
        assert!(matches!(
            res,
            Err(CycleError::Halted(HaltReason::CalendarUnauthorized))
        ));
        assert_eq!(env.calendar.list_calls(), 2);

        env.calendar.set_outage(None);
        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(2))
            .await
            .unwrap();
        // The late 2h reminder still goes out once
        assert_eq!(report.sent, 1);
        assert_eq!(dispatcher.status().halted, None);
    }

    #[actix_web::test]
    async fn unavailable_calendar_skips_the_cycle() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        let dispatcher = env.dispatcher();

        env.calendar
            .fail_next_list(CalendarProviderError::Unavailable("timeout".into()));
        let res = env.cycle_at(&dispatcher, t0()).await;
        assert!(matches!(res, Err(CycleError::Scan(_))));
        assert_eq!(env.sender.attempts(), 0);
        assert_eq!(env.ledger.flush_count(), 0);
        assert_eq!(dispatcher.status().halted, None);

        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(report.sent, 1);
    }

    #[actix_web::test]
    async fn failed_flushes_are_retried_without_resending() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        let dispatcher = env.dispatcher();

        env.ledger.fail_next_flushes(3);
        let res = env.cycle_at(&dispatcher, t0()).await;
        assert!(matches!(res, Err(CycleError::Persistence(_))));
        assert_eq!(env.sender.attempts(), 1);
        assert_eq!(dispatcher.pending_ledger_writes(), 1);
        assert!(env.ledger.persisted().is_empty());

        // The staged record still suppresses the reminder and is flushed first
        let report = env
            .cycle_at(&dispatcher, t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(report.reminders_due, 0);
        assert_eq!(env.sender.attempts(), 1);
        assert_eq!(dispatcher.pending_ledger_writes(), 0);
        assert!(env.ledger.persisted().contains_key("e1"));
    }

    #[actix_web::test]
    async fn old_records_are_pruned() {
        let env = TestEnv::new(t0());
        let old = ReminderKey {
            event_id: "old".into(),
            offset_id: "2h".into(),
        };
        env.ledger.record(
            &old,
            ReminderRecord {
                version: VersionMarker::new("v1"),
                dispatched_at: t0() - Duration::days(3),
            },
        );
        env.ledger.flush().await.unwrap();

        let report = env.cycle_at(&env.dispatcher(), t0()).await.unwrap();
        assert_eq!(report.pruned, 1);
        assert!(env.ledger.persisted().is_empty());
    }

    #[actix_web::test]
    async fn concurrent_cycles_do_not_duplicate_sends() {
        let env = TestEnv::new(t0());
        env.calendar.insert(event("e1", t0() + Duration::hours(2)));
        let dispatcher = env.dispatcher();

        let (first, second) = futures::join!(dispatcher.run_cycle(), dispatcher.run_cycle());
        assert_eq!(first.unwrap().sent + second.unwrap().sent, 1);
        assert_eq!(env.sender.attempts(), 1);
    }
}
