use super::error_from_status;
use crate::config::GoogleConfig;
use crate::repos::{GoogleToken, IGoogleTokenRepo};
use crate::services::{CalendarProviderError, IGoogleOAuth};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

// https://developers.google.com/identity/protocols/oauth2/web-server#httprest_3

pub const REQUIRED_OAUTH_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/calendar"];

#[derive(Debug, Clone)]
pub struct GoogleOAuthEndpoints {
    pub authorization: String,
    pub token: String,
}

impl Default for GoogleOAuthEndpoints {
    fn default() -> Self {
        Self {
            authorization: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token: "https://oauth2.googleapis.com/token".into(),
        }
    }
}

/// Consent screen url asking for offline access to the calendar
pub fn authorization_url(
    endpoints: &GoogleOAuthEndpoints,
    config: &GoogleConfig,
    state: &str,
) -> Result<String, url::ParseError> {
    let scope = REQUIRED_OAUTH_SCOPES.join(" ");
    let url = url::Url::parse_with_params(
        &endpoints.authorization,
        &[
            ("access_type", "offline"),
            ("include_granted_scopes", "true"),
            ("prompt", "consent"),
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", state),
        ],
    )?;
    Ok(url.into())
}

// Google api actually returns snake case response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    scope: Option<String>,
    // Access token expires in specified in seconds
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>, refresh_token: Option<String>) -> GoogleToken {
        GoogleToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(refresh_token),
            scopes: self
                .scope
                .map(|s| s.split(' ').map(String::from).collect())
                .unwrap_or_default(),
            expires_at: Some(now + Duration::seconds(self.expires_in)),
        }
    }
}

async fn request_token(
    client: &Client,
    endpoint: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse, CalendarProviderError> {
    let res = client
        .post(endpoint)
        .form(params)
        .send()
        .await
        .map_err(|e| CalendarProviderError::Unavailable(e.to_string()))?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(match error_from_status(status, body) {
            // A refused grant means the stored credentials are no longer usable
            CalendarProviderError::Rejected(msg) | CalendarProviderError::NotFound(msg) => {
                CalendarProviderError::Unauthorized(msg)
            }
            e => e,
        });
    }
    res.json::<TokenResponse>()
        .await
        .map_err(|e| CalendarProviderError::Rejected(e.to_string()))
}

pub struct CodeTokenRequest<'a> {
    pub config: &'a GoogleConfig,
    pub code: &'a str,
}

/// Exchanges the code from the OAuth callback and checks that the calendar scope was granted
pub async fn exchange_code_token(
    client: &Client,
    endpoints: &GoogleOAuthEndpoints,
    req: CodeTokenRequest<'_>,
    now: DateTime<Utc>,
) -> Result<GoogleToken, CalendarProviderError> {
    let params = [
        ("client_id", req.config.client_id.as_str()),
        ("client_secret", req.config.client_secret.as_str()),
        ("redirect_uri", req.config.redirect_uri.as_str()),
        ("code", req.code),
        ("grant_type", "authorization_code"),
    ];
    let token = request_token(client, &endpoints.token, &params)
        .await?
        .into_token(now, None);

    for required_scope in REQUIRED_OAUTH_SCOPES.iter() {
        if !token.scopes.iter().any(|s| s == required_scope) {
            return Err(CalendarProviderError::Rejected(format!(
                "The {} scope was not granted",
                required_scope
            )));
        }
    }
    Ok(token)
}

/// OAuth client for connecting the Google account
pub struct GoogleOAuthClient {
    client: Client,
    config: GoogleConfig,
    endpoints: GoogleOAuthEndpoints,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            endpoints: GoogleOAuthEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: GoogleOAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait::async_trait]
impl IGoogleOAuth for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> Result<String, CalendarProviderError> {
        authorization_url(&self.endpoints, &self.config, state)
            .map_err(|e| CalendarProviderError::Rejected(e.to_string()))
    }

    async fn exchange_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<GoogleToken, CalendarProviderError> {
        exchange_code_token(
            &self.client,
            &self.endpoints,
            CodeTokenRequest {
                config: &self.config,
                code,
            },
            now,
        )
        .await
    }
}

/// A valid access token, refreshed and stored again when it expires within a minute
pub async fn get_access_token(
    client: &Client,
    endpoints: &GoogleOAuthEndpoints,
    config: &GoogleConfig,
    tokens: &dyn IGoogleTokenRepo,
    now: DateTime<Utc>,
) -> Result<String, CalendarProviderError> {
    let token = tokens
        .load()
        .await
        .map_err(|e| CalendarProviderError::Unavailable(format!("Unable to load Google token: {}", e)))?
        .ok_or_else(|| {
            CalendarProviderError::Unauthorized(
                "Google OAuth token not found. Complete the OAuth flow first.".into(),
            )
        })?;

    if token.is_fresh(now) {
        return Ok(token.access_token);
    }
    // Access token has or will expire soon, now renew it
    let refresh_token = token.refresh_token.ok_or_else(|| {
        CalendarProviderError::Unauthorized(
            "Google access token expired and no refresh token is stored".into(),
        )
    })?;

    info!("Refreshing Google OAuth token");
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];
    let refreshed = request_token(client, &endpoints.token, &params)
        .await?
        .into_token(now, Some(refresh_token.clone()));

    if let Err(e) = tokens.save(&refreshed).await {
        warn!(
            "Unable to save refreshed Google credentials. Error: {:?}",
            e
        );
    }
    Ok(refreshed.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::InMemoryGoogleTokenRepo;
    use crate::Config;
    use chrono::TimeZone;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoints(server: &MockServer) -> GoogleOAuthEndpoints {
        GoogleOAuthEndpoints {
            authorization: format!("{}/auth", server.uri()),
            token: format!("{}/token", server.uri()),
        }
    }

    #[test]
    fn builds_authorization_url() {
        let config = Config::default();
        let url = authorization_url(&GoogleOAuthEndpoints::default(), &config.google, "abc")
            .unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("state=abc"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fcalendar"));
    }

    #[tokio::test]
    async fn exchanges_code_and_requires_calendar_scope() {
        let server = MockServer::start().await;
        let now = Utc.with_ymd_and_hms(2021, 2, 21, 12, 0, 0).unwrap();
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access",
                "refresh_token": "refresh",
                "scope": "https://www.googleapis.com/auth/calendar",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=narrow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access",
                "scope": "email",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let config = Config::default();
        let client = Client::new();
        let token = exchange_code_token(
            &client,
            &endpoints(&server),
            CodeTokenRequest {
                config: &config.google,
                code: "good",
            },
            now,
        )
        .await
        .unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(token.expires_at, Some(now + Duration::hours(1)));

        let res = exchange_code_token(
            &client,
            &endpoints(&server),
            CodeTokenRequest {
                config: &config.google,
                code: "narrow",
            },
            now,
        )
        .await;
        assert!(matches!(res, Err(CalendarProviderError::Rejected(_))));
    }

    #[tokio::test]
    async fn refreshes_expiring_tokens() {
        let server = MockServer::start().await;
        let now = Utc.with_ymd_and_hms(2021, 2, 21, 12, 0, 0).unwrap();
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "scope": "https://www.googleapis.com/auth/calendar",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config::default();
        let repo = InMemoryGoogleTokenRepo::new();
        repo.save(&GoogleToken {
            access_token: "old-access".into(),
            refresh_token: Some("refresh".into()),
            scopes: Vec::new(),
            expires_at: Some(now + Duration::seconds(30)),
        })
        .await
        .unwrap();

        let client = Client::new();
        let access_token =
            get_access_token(&client, &endpoints(&server), &config.google, &repo, now)
                .await
                .unwrap();
        assert_eq!(access_token, "new-access");
        let stored = repo.load().await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));

        // The stored token is fresh now, so no further refresh happens
        let access_token =
            get_access_token(&client, &endpoints(&server), &config.google, &repo, now)
                .await
                .unwrap();
        assert_eq!(access_token, "new-access");
    }

    #[tokio::test]
    async fn missing_or_revoked_tokens_are_unauthorized() {
        let server = MockServer::start().await;
        let now = Utc.with_ymd_and_hms(2021, 2, 21, 12, 0, 0).unwrap();
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let config = Config::default();
        let repo = InMemoryGoogleTokenRepo::new();
        let client = Client::new();
        let res = get_access_token(&client, &endpoints(&server), &config.google, &repo, now).await;
        assert!(matches!(res, Err(CalendarProviderError::Unauthorized(_))));

        repo.save(&GoogleToken {
            access_token: "old-access".into(),
            refresh_token: Some("revoked".into()),
            scopes: Vec::new(),
            expires_at: Some(now - Duration::hours(1)),
        })
        .await
        .unwrap();
        let res = get_access_token(&client, &endpoints(&server), &config.google, &repo, now).await;
        assert!(matches!(res, Err(CalendarProviderError::Unauthorized(_))));
    }
}
