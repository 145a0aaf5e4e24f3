use crate::{APIResponse, BaseClient};
use nudgeme_api_structs::twilio_webhook;
use reqwest::StatusCode;
use std::sync::Arc;

/// Posts messages the way Twilio delivers inbound SMS
#[derive(Clone)]
pub struct SmsClient {
    base: Arc<BaseClient>,
}

impl SmsClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    /// Returns the TwiML reply
    pub async fn receive(&self, from: &str, body: &str) -> APIResponse<String> {
        let form = twilio_webhook::RequestBody {
            from: from.into(),
            body: body.into(),
        };
        self.base
            .post_form(form, "twilio/webhook".into(), StatusCode::OK)
            .await
    }
}
