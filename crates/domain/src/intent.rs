use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    CreateEvent,
    RescheduleEvent,
    CancelEvent,
    ListEvents,
    Unknown,
}

/// Details pulled out of the message text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentPayload {
    pub text: String,
    pub summary: Option<String>,
    pub event_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntentResult {
    pub intent: Intent,
    pub payload: IntentPayload,
    pub original_text: String,
    pub confidence: f32,
}

const CREATE_KEYWORDS: [&str; 3] = ["add", "create", "schedule"];
const RESCHEDULE_KEYWORDS: [&str; 4] = ["move", "reschedule", "delay", "shift"];
const CANCEL_KEYWORDS: [&str; 3] = ["cancel", "delete", "remove"];

/// Keyword based intent detection for inbound SMS.
///
/// Timestamps must be written as RFC 3339 (`2021-02-21T15:00:00Z`): the first
/// one is the start and the second one the end. An `id:<event id>` token
/// selects the event to reschedule or cancel.
pub fn parse_intent(text: &str) -> IntentResult {
    let text = text.trim();
    if text.is_empty() {
        return IntentResult {
            intent: Intent::Unknown,
            payload: IntentPayload::default(),
            original_text: text.to_string(),
            confidence: 0.0,
        };
    }

    let lowered = text.to_lowercase();
    let words = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| words.contains(k));
    // "what is on my schedule" would otherwise match the create keyword "schedule"
    let intent = if words.contains(&"what") && words.contains(&"schedule") {
        Intent::ListEvents
    } else if contains_any(&CREATE_KEYWORDS) {
        Intent::CreateEvent
    } else if contains_any(&RESCHEDULE_KEYWORDS) {
        Intent::RescheduleEvent
    } else if contains_any(&CANCEL_KEYWORDS) {
        Intent::CancelEvent
    } else if words.contains(&"list") {
        Intent::ListEvents
    } else {
        Intent::Unknown
    };

    let confidence = if intent == Intent::Unknown { 0.1 } else { 0.5 };

    IntentResult {
        intent,
        payload: extract_payload(text),
        original_text: text.to_string(),
        confidence,
    }
}

fn is_keyword(word: &str) -> bool {
    let word = word.to_lowercase();
    CREATE_KEYWORDS
        .iter()
        .chain(RESCHEDULE_KEYWORDS.iter())
        .chain(CANCEL_KEYWORDS.iter())
        .any(|k| *k == word)
}

fn extract_payload(text: &str) -> IntentPayload {
    let mut payload = IntentPayload {
        text: text.to_string(),
        ..Default::default()
    };
    let mut summary_words = Vec::new();
    for word in text.split_whitespace() {
        if let Ok(ts) = DateTime::parse_from_rfc3339(word) {
            let ts = ts.with_timezone(&Utc);
            if payload.start.is_none() {
                payload.start = Some(ts);
            } else if payload.end.is_none() {
                payload.end = Some(ts);
            }
            continue;
        }
        if let Some(id) = word.strip_prefix("id:") {
            if !id.is_empty() {
                payload.event_id = Some(id.to_string());
            }
            continue;
        }
        if summary_words.is_empty() && is_keyword(word) {
            continue;
        }
        // Connectors left over once the timestamps are removed
        if ["at", "to", "from", "until", "-"].contains(&word.to_lowercase().as_str()) {
            continue;
        }
        summary_words.push(word);
    }
    if !summary_words.is_empty() {
        payload.summary = Some(summary_words.join(" "));
    }
    payload
}
