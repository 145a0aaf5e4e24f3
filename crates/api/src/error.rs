use actix_web::{
    http::{header, StatusCode},
    HttpResponse,
};
use nudgeme_infra::CalendarProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NudgemeError {
    #[error("Internal server error")]
    InternalError,
    #[error("Invalid data provided: Error message: `{0}`")]
    BadClientData(String),
    #[error("Unauthorized request. Error message: `{0}`")]
    Unauthorized(String),
    #[error("404 Not found. Error message: `{0}`")]
    NotFound(String),
    #[error("The calendar could not be reached. Error message: `{0}`")]
    BadGateway(String),
}

impl NudgemeError {
    pub fn from_calendar(e: CalendarProviderError) -> Self {
        match e {
            CalendarProviderError::Unavailable(msg) => Self::BadGateway(msg),
            CalendarProviderError::Unauthorized(msg) => Self::Unauthorized(msg),
            CalendarProviderError::Rejected(msg) => Self::BadClientData(msg),
            CalendarProviderError::NotFound(msg) => Self::NotFound(msg),
        }
    }
}

impl actix_web::error::ResponseError for NudgemeError {
    fn status_code(&self) -> StatusCode {
        match *self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadClientData(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header((header::CONTENT_TYPE, "text/html; charset=utf-8"))
            .body(self.to_string())
    }
}
