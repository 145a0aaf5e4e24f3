use super::twiml;
use crate::{
    event::{
        create_event::{self, CreateEventUseCase},
        get_events_today::{self, GetEventsTodayUseCase},
    },
    shared::usecase::{execute, UseCase},
};
use actix_web::{http::header, web, HttpResponse};
use chrono::Duration;
use nudgeme_api_structs::twilio_webhook::*;
use nudgeme_domain::{
    date::format_local_time, message::agenda_text, parse_intent, CalendarEventPatch, Intent,
    IntentPayload, MessageStyle,
};
use nudgeme_infra::{CalendarProviderError, NudgemeContext};
use tracing::info;

/// Events created over SMS without an end time last this long
const DEFAULT_EVENT_DURATION_MINUTES: i64 = 60;

fn handle_error(e: UseCaseErrors, style: MessageStyle) -> String {
    match e {
        UseCaseErrors::Calendar(_) => style.decorate(
            "😬",
            "Google Calendar didn't like that. Try again in a sec?".into(),
        ),
        UseCaseErrors::MissingDetails(_) => style.decorate(
            "🤔",
            "I need a bit more info to do that. Can you rephrase?".into(),
        ),
    }
}

pub async fn twilio_webhook_controller(
    form: web::Form<RequestBody>,
    ctx: web::Data<NudgemeContext>,
) -> HttpResponse {
    let form = form.0;
    info!(from = %form.from, "Incoming SMS: {}", form.body);

    let style = MessageStyle::from_personality(&ctx.config.personality_prompt);
    let usecase = HandleInboundSmsUseCase {
        text: form.body,
        style,
    };
    let reply = match execute(usecase, &ctx).await {
        Ok(reply) => reply,
        Err(e) => handle_error(e, style),
    };

    info!("Responding via Twilio: {}", reply);
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "application/xml"))
        .body(twiml::message_response(&reply))
}

/// Acts on the intent of an inbound SMS and produces the reply text
#[derive(Debug)]
pub struct HandleInboundSmsUseCase {
    pub text: String,
    pub style: MessageStyle,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    MissingDetails(String),
    Calendar(CalendarProviderError),
}

impl HandleInboundSmsUseCase {
    async fn list_events(&self, ctx: &NudgemeContext) -> Result<String, UseCaseErrors> {
        let events = execute(GetEventsTodayUseCase {}, ctx)
            .await
            .map_err(|e| match e {
                get_events_today::UseCaseErrors::Calendar(e) => UseCaseErrors::Calendar(e),
            })?;
        Ok(agenda_text(&events, &ctx.config.timezone, self.style))
    }

    async fn create_event(
        &self,
        payload: IntentPayload,
        ctx: &NudgemeContext,
    ) -> Result<String, UseCaseErrors> {
        let summary = payload
            .summary
            .ok_or_else(|| UseCaseErrors::MissingDetails("summary".into()))?;
        let start = payload
            .start
            .ok_or_else(|| UseCaseErrors::MissingDetails("start time".into()))?;
        let end = payload
            .end
            .unwrap_or_else(|| start + Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES));

        let usecase = CreateEventUseCase {
            summary,
            start,
            end,
            description: None,
            timezone: None,
        };
        let event = execute(usecase, ctx).await.map_err(|e| match e {
            create_event::UseCaseErrors::Calendar(e) => UseCaseErrors::Calendar(e),
            e => UseCaseErrors::MissingDetails(format!("{:?}", e)),
        })?;

        Ok(self.style.decorate(
            "✨",
            format!(
                "Added '{}' at {}",
                event.summary,
                format_local_time(&event.start, &ctx.config.timezone)
            ),
        ))
    }

    async fn reschedule_event(
        &self,
        payload: IntentPayload,
        ctx: &NudgemeContext,
    ) -> Result<String, UseCaseErrors> {
        let event_id = payload
            .event_id
            .ok_or_else(|| UseCaseErrors::MissingDetails("event id".into()))?;
        let patch = CalendarEventPatch {
            start: payload.start,
            end: payload.end,
            ..Default::default()
        };
        if patch.is_empty() {
            return Err(UseCaseErrors::MissingDetails("new time".into()));
        }

        let event = ctx
            .services
            .calendar
            .update_event(&event_id, &patch)
            .await
            .map_err(UseCaseErrors::Calendar)?;

        Ok(self.style.decorate(
            "🔁",
            format!(
                "Rescheduled '{}' to {}",
                event.summary,
                format_local_time(&event.start, &ctx.config.timezone)
            ),
        ))
    }

    async fn cancel_event(
        &self,
        payload: IntentPayload,
        ctx: &NudgemeContext,
    ) -> Result<String, UseCaseErrors> {
        let event_id = payload
            .event_id
            .ok_or_else(|| UseCaseErrors::MissingDetails("event id".into()))?;
        ctx.services
            .calendar
            .delete_event(&event_id)
            .await
            .map_err(UseCaseErrors::Calendar)?;

        Ok(self
            .style
            .decorate("🗑️", "Got it — event canceled.".into()))
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for HandleInboundSmsUseCase {
    type Response = String;

    type Errors = UseCaseErrors;

    async fn execute(&mut self, ctx: &NudgemeContext) -> Result<Self::Response, Self::Errors> {
        let intent = parse_intent(&self.text);
        info!(
            "Parsed intent {:?} with confidence {:.2}",
            intent.intent, intent.confidence
        );

        match intent.intent {
            Intent::ListEvents => self.list_events(ctx).await,
            Intent::CreateEvent => self.create_event(intent.payload, ctx).await,
            Intent::RescheduleEvent => self.reschedule_event(intent.payload, ctx).await,
            Intent::CancelEvent => self.cancel_event(intent.payload, ctx).await,
            Intent::Unknown => Ok("Sorry, I didn't understand that — mind rephrasing?".into()),
        }
    }
}
