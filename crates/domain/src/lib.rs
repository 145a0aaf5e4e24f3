pub mod date;
mod event;
mod intent;
pub mod message;
mod reminder;

pub use event::{CalendarEvent, CalendarEventPatch, NewCalendarEvent, VersionMarker};
pub use intent::{parse_intent, Intent, IntentPayload, IntentResult};
pub use message::MessageStyle;
pub use reminder::{
    decide, DecisionOutcome, HorizonWindow, ReminderKey, ReminderOffset, ReminderRecord,
};

pub use chrono_tz::Tz;
