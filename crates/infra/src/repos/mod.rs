mod google_tokens;
mod reminder_ledger;
pub(crate) mod shared;

use crate::config::Config;
pub use google_tokens::{
    GoogleToken, IGoogleTokenRepo, InMemoryGoogleTokenRepo, JsonFileGoogleTokenRepo,
};
pub use reminder_ledger::{
    IReminderLedger, InMemoryReminderLedger, JsonFileReminderLedger, LedgerDocument, LedgerError,
};
pub use shared::json_file::JsonFileError;
use std::sync::Arc;

#[derive(Clone)]
pub struct Repos {
    pub reminder_ledger: Arc<dyn IReminderLedger>,
    pub google_tokens: Arc<dyn IGoogleTokenRepo>,
}

impl Repos {
    pub async fn create_json_files(config: &Config) -> Result<Self, LedgerError> {
        let reminder_ledger =
            JsonFileReminderLedger::open(config.reminders.state_path.clone()).await?;
        Ok(Self {
            reminder_ledger: Arc::new(reminder_ledger),
            google_tokens: Arc::new(JsonFileGoogleTokenRepo::new(
                config.google.token_path.clone(),
            )),
        })
    }

    pub fn create_inmemory() -> Self {
        Self {
            reminder_ledger: Arc::new(InMemoryReminderLedger::new()),
            google_tokens: Arc::new(InMemoryGoogleTokenRepo::new()),
        }
    }
}
