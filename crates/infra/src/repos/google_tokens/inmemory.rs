use super::{GoogleToken, IGoogleTokenRepo};
use crate::repos::shared::inmemory_repo::*;
use std::sync::Mutex;

pub struct InMemoryGoogleTokenRepo {
    token: Mutex<Option<GoogleToken>>,
}

impl InMemoryGoogleTokenRepo {
    pub fn new() -> Self {
        Self {
            token: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl IGoogleTokenRepo for InMemoryGoogleTokenRepo {
    async fn load(&self) -> anyhow::Result<Option<GoogleToken>> {
        Ok(find(&self.token))
    }

    async fn save(&self, token: &GoogleToken) -> anyhow::Result<()> {
        save(token, &self.token);
        Ok(())
    }
}
