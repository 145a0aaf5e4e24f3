use crate::date::{format_local_time, humanize_duration};
use crate::{CalendarEvent, ReminderOffset};
use chrono::Duration;
use chrono_tz::Tz;

/// How outbound SMS copy is decorated. Derived from the personality prompt,
/// scheduling never depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    Playful,
    Plain,
}

impl MessageStyle {
    pub fn from_personality(prompt: &str) -> Self {
        if prompt.to_lowercase().contains("emoji") {
            Self::Playful
        } else {
            Self::Plain
        }
    }

    /// Prefixes `text` with `emoji` for the playful style
    pub fn decorate(&self, emoji: &str, text: String) -> String {
        match self {
            Self::Playful => format!("{} {}", emoji, text),
            Self::Plain => text,
        }
    }
}

pub fn reminder_text(summary: &str, offset: &ReminderOffset, style: MessageStyle) -> String {
    let lead = humanize_duration(offset.before());
    if offset.before() >= Duration::hours(1) {
        style.decorate(
            "⏰",
            format!("Heads up! '{}' starts in ~{}.", summary, lead),
        )
    } else {
        style.decorate(
            "🚀",
            format!("Almost go time! '{}' kicks off in {}.", summary, lead),
        )
    }
}

/// A single line of the daily agenda, e.g. `• 9:00 AM - 10:00 AM: Standup`
pub fn event_line(event: &CalendarEvent, tz: &Tz) -> String {
    format!(
        "• {} - {}: {}",
        format_local_time(&event.start, tz),
        format_local_time(&event.end, tz),
        event.summary
    )
}

pub fn agenda_text(events: &[CalendarEvent], tz: &Tz, style: MessageStyle) -> String {
    if events.is_empty() {
        return style.decorate(
            "📭",
            "Nothing on the books today. Enjoy the free time!".into(),
        );
    }
    let mut lines = vec![style.decorate("📅", "Here's today:".into())];
    lines.extend(events.iter().map(|e| event_line(e, tz)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VersionMarker;
    use chrono::{TimeZone, Utc};

    #[test]
    fn reminder_copy_depends_on_lead_time() {
        let two_hours = ReminderOffset::parse("2h").unwrap();
        let ten_minutes = ReminderOffset::parse("10m").unwrap();

        assert_eq!(
            reminder_text("Standup", &two_hours, MessageStyle::Playful),
            "⏰ Heads up! 'Standup' starts in ~2 hours."
        );
        assert_eq!(
            reminder_text("Standup", &ten_minutes, MessageStyle::Plain),
            "Almost go time! 'Standup' kicks off in 10 minutes."
        );
    }

    #[test]
    fn style_follows_personality_prompt() {
        assert_eq!(
            MessageStyle::from_personality("sends fun reminders with Emojis"),
            MessageStyle::Playful
        );
        assert_eq!(
            MessageStyle::from_personality("terse and professional"),
            MessageStyle::Plain
        );
    }

    #[test]
    fn renders_agenda() {
        let start = Utc.with_ymd_and_hms(2021, 2, 21, 9, 0, 0).unwrap();
        let event = CalendarEvent {
            id: "e1".into(),
            summary: "Standup".into(),
            description: None,
            start,
            end: start + Duration::minutes(30),
            timezone: "UTC".into(),
            status: "confirmed".into(),
            version: VersionMarker::new("v1"),
        };
        assert_eq!(
            agenda_text(&[event], &chrono_tz::UTC, MessageStyle::Plain),
            "Here's today:\n• 9:00 AM - 9:30 AM: Standup"
        );
        assert_eq!(
            agenda_text(&[], &chrono_tz::UTC, MessageStyle::Playful),
            "📭 Nothing on the books today. Enjoy the free time!"
        );
    }
}
