use super::{GoogleToken, IGoogleTokenRepo};
use crate::repos::shared::json_file::{read_json_file, write_json_file};
use std::path::PathBuf;

pub struct JsonFileGoogleTokenRepo {
    path: PathBuf,
}

impl JsonFileGoogleTokenRepo {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl IGoogleTokenRepo for JsonFileGoogleTokenRepo {
    async fn load(&self) -> anyhow::Result<Option<GoogleToken>> {
        Ok(read_json_file(&self.path).await?)
    }

    async fn save(&self, token: &GoogleToken) -> anyhow::Result<()> {
        write_json_file(&self.path, token).await?;
        Ok(())
    }
}
