use crate::{APIResponse, BaseClient};
use nudgeme_api_structs::{google_oauth_callback, start_google_oauth};
use reqwest::StatusCode;
use std::sync::Arc;

#[derive(Clone)]
pub struct OAuthClient {
    base: Arc<BaseClient>,
}

impl OAuthClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    pub async fn start_google(&self) -> APIResponse<start_google_oauth::APIResponse> {
        self.base
            .get("oauth/google/start".into(), StatusCode::OK)
            .await
    }

    pub async fn google_callback(
        &self,
        code: &str,
        state: &str,
    ) -> APIResponse<google_oauth_callback::APIResponse> {
        self.base
            .get(
                format!("oauth/google/callback?code={}&state={}", code, state),
                StatusCode::OK,
            )
            .await
    }
}
