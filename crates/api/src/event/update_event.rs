use crate::{
    error::NudgemeError,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpResponse};
use nudgeme_api_structs::update_event::*;
use nudgeme_domain::{CalendarEvent, CalendarEventPatch};
use nudgeme_infra::{CalendarProviderError, NudgemeContext};

fn handle_error(e: UseCaseErrors) -> NudgemeError {
    match e {
        UseCaseErrors::NoFieldsSupplied => NudgemeError::BadClientData("No fields supplied".into()),
        UseCaseErrors::InvalidTimespan => NudgemeError::BadClientData(
            "The end time of the event must not be before its start time".into(),
        ),
        UseCaseErrors::Calendar(e) => NudgemeError::from_calendar(e),
    }
}

pub async fn update_event_controller(
    path_params: web::Path<PathParams>,
    body: web::Json<RequestBody>,
    ctx: web::Data<NudgemeContext>,
) -> Result<HttpResponse, NudgemeError> {
    let body = body.0;
    let usecase = UpdateEventUseCase {
        event_id: path_params.event_id.clone(),
        patch: CalendarEventPatch {
            summary: body.summary,
            start: body.start_time,
            end: body.end_time,
            description: body.description,
        },
    };

    execute(usecase, &ctx)
        .await
        .map(|event| HttpResponse::Ok().json(APIResponse::new(event)))
        .map_err(handle_error)
}

#[derive(Debug)]
pub struct UpdateEventUseCase {
    pub event_id: String,
    pub patch: CalendarEventPatch,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NoFieldsSupplied,
    InvalidTimespan,
    Calendar(CalendarProviderError),
}

#[async_trait::async_trait(?Send)]
impl UseCase for UpdateEventUseCase {
    type Response = CalendarEvent;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &NudgemeContext) -> Result<Self::Response, Self::Errors> {
        if self.patch.is_empty() {
            return Err(UseCaseErrors::NoFieldsSupplied);
        }
        if let (Some(start), Some(end)) = (self.patch.start, self.patch.end) {
            if end < start {
                return Err(UseCaseErrors::InvalidTimespan);
            }
        }

        ctx.services
            .calendar
            .update_event(&self.event_id, &self.patch)
            .await
            .map_err(UseCaseErrors::Calendar)
    }
}
