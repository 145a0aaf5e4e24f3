use crate::{
    error::NudgemeError,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use nudgeme_api_structs::create_event::*;
use nudgeme_domain::{CalendarEvent, NewCalendarEvent, Tz};
use nudgeme_infra::{CalendarProviderError, NudgemeContext};

fn handle_error(e: UseCaseErrors) -> NudgemeError {
    match e {
        UseCaseErrors::EmptySummary => {
            NudgemeError::BadClientData("The event summary must not be empty".into())
        }
        UseCaseErrors::InvalidTimespan => NudgemeError::BadClientData(
            "The end time of the event must not be before its start time".into(),
        ),
        UseCaseErrors::InvalidTimezone(tz) => {
            NudgemeError::BadClientData(format!("Unknown timezone: {}", tz))
        }
        UseCaseErrors::Calendar(e) => NudgemeError::from_calendar(e),
    }
}

pub async fn create_event_controller(
    body: web::Json<RequestBody>,
    ctx: web::Data<NudgemeContext>,
) -> Result<HttpResponse, NudgemeError> {
    let body = body.0;
    let usecase = CreateEventUseCase {
        summary: body.summary,
        start: body.start_time,
        end: body.end_time,
        description: body.description,
        timezone: body.timezone,
    };

    execute(usecase, &ctx)
        .await
        .map(|event| HttpResponse::Created().json(APIResponse::new(event)))
        .map_err(handle_error)
}

#[derive(Debug)]
pub struct CreateEventUseCase {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    EmptySummary,
    InvalidTimespan,
    InvalidTimezone(String),
    Calendar(CalendarProviderError),
}

#[async_trait::async_trait(?Send)]
impl UseCase for CreateEventUseCase {
    type Response = CalendarEvent;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &NudgemeContext) -> Result<Self::Response, Self::Errors> {
        let summary = self.summary.trim();
        if summary.is_empty() {
            return Err(UseCaseErrors::EmptySummary);
        }
        if self.end < self.start {
            return Err(UseCaseErrors::InvalidTimespan);
        }
        if let Some(tz) = &self.timezone {
            if tz.parse::<Tz>().is_err() {
                return Err(UseCaseErrors::InvalidTimezone(tz.clone()));
            }
        }

        let event = NewCalendarEvent {
            summary: summary.to_string(),
            start: self.start,
            end: self.end,
            description: self.description.clone(),
            timezone: self.timezone.clone(),
        };
        ctx.services
            .calendar
            .create_event(&event)
            .await
            .map_err(UseCaseErrors::Calendar)
    }
}
