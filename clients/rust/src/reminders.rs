use crate::{APIResponse, BaseClient};
use nudgeme_api_structs::get_reminders_status;
use reqwest::StatusCode;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReminderClient {
    base: Arc<BaseClient>,
}

impl ReminderClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    pub async fn status(&self) -> APIResponse<get_reminders_status::APIResponse> {
        self.base
            .get("reminders/status".into(), StatusCode::OK)
            .await
    }
}
