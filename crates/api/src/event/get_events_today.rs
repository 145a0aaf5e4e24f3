use crate::{
    error::NudgemeError,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpResponse};
use nudgeme_api_structs::get_events_today::*;
use nudgeme_domain::{date::local_day_bounds, CalendarEvent};
use nudgeme_infra::{CalendarProviderError, NudgemeContext};

fn handle_error(e: UseCaseErrors) -> NudgemeError {
    match e {
        UseCaseErrors::Calendar(e) => NudgemeError::from_calendar(e),
    }
}

pub async fn get_events_today_controller(
    ctx: web::Data<NudgemeContext>,
) -> Result<HttpResponse, NudgemeError> {
    let usecase = GetEventsTodayUseCase {};

    execute(usecase, &ctx)
        .await
        .map(|events| HttpResponse::Ok().json(APIResponse::new(events)))
        .map_err(handle_error)
}

/// Events of the current day in the configured timezone
#[derive(Debug)]
pub struct GetEventsTodayUseCase {}

#[derive(Debug)]
pub enum UseCaseErrors {
    Calendar(CalendarProviderError),
}

#[async_trait::async_trait(?Send)]
impl UseCase for GetEventsTodayUseCase {
    type Response = Vec<CalendarEvent>;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &NudgemeContext) -> Result<Self::Response, Self::Errors> {
        let (start, end) = local_day_bounds(ctx.sys.now(), &ctx.config.timezone);
        let events = ctx
            .services
            .calendar
            .list_events(start, end)
            .await
            .map_err(UseCaseErrors::Calendar)?;

        Ok(events.into_iter().filter(|e| !e.is_cancelled()).collect())
    }
}
