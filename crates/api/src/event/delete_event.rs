use crate::{
    error::NudgemeError,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpResponse};
use nudgeme_api_structs::delete_event::*;
use nudgeme_infra::{CalendarProviderError, NudgemeContext};

fn handle_error(e: UseCaseErrors) -> NudgemeError {
    match e {
        UseCaseErrors::Calendar(e) => NudgemeError::from_calendar(e),
    }
}

pub async fn delete_event_controller(
    path_params: web::Path<PathParams>,
    ctx: web::Data<NudgemeContext>,
) -> Result<HttpResponse, NudgemeError> {
    let usecase = DeleteEventUseCase {
        event_id: path_params.event_id.clone(),
    };

    execute(usecase, &ctx)
        .await
        .map(|event_id| HttpResponse::Ok().json(APIResponse::new(event_id)))
        .map_err(handle_error)
}

#[derive(Debug)]
pub struct DeleteEventUseCase {
    pub event_id: String,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    Calendar(CalendarProviderError),
}

#[async_trait::async_trait(?Send)]
impl UseCase for DeleteEventUseCase {
    type Response = String;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &NudgemeContext) -> Result<Self::Response, Self::Errors> {
        ctx.services
            .calendar
            .delete_event(&self.event_id)
            .await
            .map_err(UseCaseErrors::Calendar)?;
        Ok(self.event_id.clone())
    }
}
