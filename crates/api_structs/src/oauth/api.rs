use serde::{Deserialize, Serialize};

pub mod start_google_oauth {
    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct APIResponse {
        pub authorization_url: String,
        pub state: String,
    }
}

pub mod google_oauth_callback {
    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    pub struct QueryParams {
        pub code: String,
        pub state: String,
    }

    #[derive(Debug, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct APIResponse {
        pub status: String,
        pub message: String,
    }
}
