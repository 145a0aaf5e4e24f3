mod base;
mod event;
mod oauth;
mod reminders;
mod sms;
mod status;

pub(crate) use base::BaseClient;
pub use base::{APIError, APIResponse};
use event::CalendarEventClient;
pub use event::{CreateEventInput, UpdateEventInput};
pub use nudgeme_api_structs::dtos::*;
use oauth::OAuthClient;
use reminders::ReminderClient;
use sms::SmsClient;
use status::StatusClient;
use std::sync::Arc;

// Domain
pub use nudgeme_api_structs::dtos::CalendarEventDTO as CalendarEvent;
pub use nudgeme_api_structs::dtos::CycleReportDTO as CycleReport;
pub use nudgeme_api_structs::dtos::HaltReasonDTO as HaltReason;
pub use nudgeme_domain::Tz;

/// Nudgeme SDK
///
/// The SDK contains methods for interacting with the Nudgeme server API.
#[derive(Clone)]
pub struct NudgemeSDK {
    pub event: CalendarEventClient,
    pub oauth: OAuthClient,
    pub reminders: ReminderClient,
    pub sms: SmsClient,
    pub status: StatusClient,
}

impl NudgemeSDK {
    pub fn new(address: String) -> Self {
        let base = Arc::new(BaseClient::new(address));
        let event = CalendarEventClient::new(base.clone());
        let oauth = OAuthClient::new(base.clone());
        let reminders = ReminderClient::new(base.clone());
        let sms = SmsClient::new(base.clone());
        let status = StatusClient::new(base);

        Self {
            event,
            oauth,
            reminders,
            sms,
            status,
        }
    }
}
