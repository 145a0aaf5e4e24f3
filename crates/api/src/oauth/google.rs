use super::OAuthStateCache;
use crate::{
    error::NudgemeError,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpResponse};
use nudgeme_api_structs::{google_oauth_callback, start_google_oauth};
use nudgeme_infra::{CalendarProviderError, NudgemeContext};
use tracing::info;

pub async fn start_google_oauth_controller(
    ctx: web::Data<NudgemeContext>,
    states: web::Data<OAuthStateCache>,
) -> Result<HttpResponse, NudgemeError> {
    let usecase = StartGoogleOAuthUseCase { states: &states };

    execute(usecase, &ctx)
        .await
        .map(|res| {
            HttpResponse::Ok().json(start_google_oauth::APIResponse {
                authorization_url: res.authorization_url,
                state: res.state,
            })
        })
        .map_err(|e| match e {
            StartUseCaseErrors::InvalidAuthorizationUrl(_) => NudgemeError::InternalError,
        })
}

#[derive(Debug)]
pub struct StartGoogleOAuthUseCase<'a> {
    pub states: &'a OAuthStateCache,
}

#[derive(Debug)]
pub struct StartUseCaseRes {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Debug)]
pub enum StartUseCaseErrors {
    InvalidAuthorizationUrl(CalendarProviderError),
}

#[async_trait::async_trait(?Send)]
impl<'a> UseCase for StartGoogleOAuthUseCase<'a> {
    type Response = StartUseCaseRes;

    type Errors = StartUseCaseErrors;

    async fn execute(&mut self, ctx: &NudgemeContext) -> Result<Self::Response, Self::Errors> {
        let state = self.states.issue(ctx.sys.now());
        let authorization_url = ctx
            .services
            .google_oauth
            .authorization_url(&state)
            .map_err(StartUseCaseErrors::InvalidAuthorizationUrl)?;
        Ok(StartUseCaseRes {
            authorization_url,
            state,
        })
    }
}

fn handle_callback_error(e: CallbackUseCaseErrors) -> NudgemeError {
    match e {
        CallbackUseCaseErrors::UnknownState => {
            NudgemeError::BadClientData("Unknown or expired state parameter".into())
        }
        CallbackUseCaseErrors::OAuthFailed(CalendarProviderError::Unavailable(msg)) => {
            NudgemeError::BadGateway(msg)
        }
        CallbackUseCaseErrors::OAuthFailed(e) => NudgemeError::BadClientData(format!(
            "The oauth process failed. Make sure the code is correct and the calendar scope is granted. Error message: {}",
            e
        )),
        CallbackUseCaseErrors::StorageError => NudgemeError::InternalError,
    }
}

pub async fn google_oauth_callback_controller(
    query: web::Query<google_oauth_callback::QueryParams>,
    ctx: web::Data<NudgemeContext>,
    states: web::Data<OAuthStateCache>,
) -> Result<HttpResponse, NudgemeError> {
    let query = query.into_inner();
    let usecase = GoogleOAuthCallbackUseCase {
        code: query.code,
        state: query.state,
        states: &states,
    };

    execute(usecase, &ctx)
        .await
        .map(|_| {
            HttpResponse::Ok().json(google_oauth_callback::APIResponse {
                status: "ok".into(),
                message: "Google account connected".into(),
            })
        })
        .map_err(handle_callback_error)
}

pub struct GoogleOAuthCallbackUseCase<'a> {
    pub code: String,
    pub state: String,
    pub states: &'a OAuthStateCache,
}

// The authorization code is a credential and stays out of the logs
impl<'a> std::fmt::Debug for GoogleOAuthCallbackUseCase<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleOAuthCallbackUseCase")
            .field("state", &self.state)
            .finish()
    }
}

#[derive(Debug)]
pub enum CallbackUseCaseErrors {
    UnknownState,
    OAuthFailed(CalendarProviderError),
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl<'a> UseCase for GoogleOAuthCallbackUseCase<'a> {
    type Response = ();

    type Errors = CallbackUseCaseErrors;

    async fn execute(&mut self, ctx: &NudgemeContext) -> Result<Self::Response, Self::Errors> {
        let now = ctx.sys.now();
        if !self.states.consume(&self.state, now) {
            return Err(CallbackUseCaseErrors::UnknownState);
        }

        let token = ctx
            .services
            .google_oauth
            .exchange_code(&self.code, now)
            .await
            .map_err(CallbackUseCaseErrors::OAuthFailed)?;

        ctx.repos
            .google_tokens
            .save(&token)
            .await
            .map_err(|_| CallbackUseCaseErrors::StorageError)?;
        info!("Google account connected");
        Ok(())
    }
}
