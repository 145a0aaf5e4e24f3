use crate::date::{format_compact_duration, parse_compact_duration, InvalidDuration};
use crate::event::{CalendarEvent, VersionMarker};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed lead time before the start of a `CalendarEvent` at which
/// a reminder should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderOffset {
    /// Canonical compact rendering of `before`, e.g. `2h` or `10m`.
    /// Used as the offset part of a `ReminderKey`.
    id: String,
    before: Duration,
}

impl ReminderOffset {
    pub fn new(before: Duration) -> Self {
        Self {
            id: format_compact_duration(before),
            before,
        }
    }

    pub fn parse(input: &str) -> Result<Self, InvalidDuration> {
        parse_compact_duration(input).map(Self::new)
    }

    /// Parses a comma separated list like `2h,10m` into an ordered set,
    /// largest lead time first and without duplicates
    pub fn parse_list(input: &str) -> Result<Vec<Self>, InvalidDuration> {
        let mut offsets = input
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Self::parse)
            .collect::<Result<Vec<_>, _>>()?;
        offsets.sort_by(|o1, o2| o2.before.cmp(&o1.before));
        offsets.dedup();
        Ok(offsets)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn before(&self) -> Duration {
        self.before
    }

    /// The instant at which this reminder becomes due for an event starting at `start`
    pub fn fire_at(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start - self.before
    }
}

impl fmt::Display for ReminderOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Identifies one logical reminder: an event and one of the configured offsets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReminderKey {
    pub event_id: String,
    pub offset_id: String,
}

impl ReminderKey {
    pub fn new(event: &CalendarEvent, offset: &ReminderOffset) -> Self {
        Self {
            event_id: event.id.clone(),
            offset_id: offset.id().to_string(),
        }
    }
}

impl fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.event_id, self.offset_id)
    }
}

/// Ledger entry proving that a reminder was handed to the message collaborator.
///
/// A `ReminderRecord` only exists for a `ReminderKey` once the reminder for the
/// exact event version has been sent. When the event is edited afterwards the
/// record becomes stale and no longer suppresses a reminder for the new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRecord {
    /// Version of the `CalendarEvent` observed when the reminder was sent
    pub version: VersionMarker,
    pub dispatched_at: DateTime<Utc>,
}

impl ReminderRecord {
    pub fn is_stale(&self, current_version: &VersionMarker) -> bool {
        self.version != *current_version
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The reminder is due and has not been sent for the current event version
    Fire,
    AlreadySent,
    NotYetDue,
    /// The event or the offset falls outside of the lookahead window
    OutOfWindow,
}

/// The half open interval `[now, now + lookahead)` scanned every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl HorizonWindow {
    pub fn new(now: DateTime<Utc>, lookahead: Duration) -> Self {
        Self {
            start: now,
            end: now + lookahead,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn lookahead(&self) -> Duration {
        self.end - self.start
    }
}

/// Decides what to do with the reminder `offset` for `event` at `now`.
///
/// `record` is the ledger entry for the `ReminderKey` of the pair, if any.
/// Late reminders are never skipped: once `fire_at` has passed the outcome
/// stays `Fire` until a matching record exists or the event leaves the window.
pub fn decide(
    window: &HorizonWindow,
    event: &CalendarEvent,
    offset: &ReminderOffset,
    record: Option<&ReminderRecord>,
) -> DecisionOutcome {
    if offset.before() > window.lookahead() || !window.contains(event.start) {
        return DecisionOutcome::OutOfWindow;
    }

    if window.start < offset.fire_at(event.start) {
        return DecisionOutcome::NotYetDue;
    }

    match record {
        Some(record) if !record.is_stale(&event.version) => DecisionOutcome::AlreadySent,
        _ => DecisionOutcome::Fire,
    }
}
