mod inmemory;
mod json_file;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub use inmemory::InMemoryGoogleTokenRepo;
pub use json_file::JsonFileGoogleTokenRepo;

/// OAuth credentials for the single connected Google account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl GoogleToken {
    /// Whether the access token is still valid for at least one more minute
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::minutes(1) <= expires_at,
            None => true,
        }
    }
}

#[async_trait::async_trait]
pub trait IGoogleTokenRepo: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<GoogleToken>>;
    async fn save(&self, token: &GoogleToken) -> anyhow::Result<()>;
}
