use super::{IMessageSender, SendError, SentMessage};
use crate::config::TwilioConfig;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::error;

const TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

/// Sends SMS through the Twilio Messages API
pub struct TwilioMessageSender {
    client: Client,
    config: TwilioConfig,
    base_url: String,
}

impl TwilioMessageSender {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            base_url: TWILIO_API_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

fn error_from_status(status: StatusCode, body: String) -> SendError {
    let msg = format!("{}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SendError::Unauthorized(msg),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => SendError::Transient(msg),
        s if s.is_server_error() => SendError::Transient(msg),
        _ => SendError::Rejected(msg),
    }
}

#[async_trait::async_trait]
impl IMessageSender for TwilioMessageSender {
    async fn send(&self, to: &str, body: &str) -> Result<SentMessage, SendError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.config.account_sid
        );
        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];
        let res = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!("[Network Error] Twilio API error. Error message: {:?}", e);
                SendError::Transient(e.to_string())
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(
                "[Unexpected Response] Twilio API responded with status: {}. Body: {}",
                status, body
            );
            return Err(error_from_status(status, body));
        }
        // The message is accepted at this point, an unreadable body must not trigger a resend
        let id = match res.json::<MessageResponse>().await {
            Ok(message) => message.sid,
            Err(_) => String::new(),
        };
        Ok(SentMessage {
            id,
            to: to.to_string(),
        })
    }
}
