use crate::{APIResponse, BaseClient};
use chrono::{DateTime, Utc};
use nudgeme_api_structs::*;
use reqwest::StatusCode;
use std::sync::Arc;

#[derive(Clone)]
pub struct CalendarEventClient {
    base: Arc<BaseClient>,
}

pub struct CreateEventInput {
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Default)]
pub struct UpdateEventInput {
    pub event_id: String,
    pub summary: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl CalendarEventClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    pub async fn today(&self) -> APIResponse<get_events_today::APIResponse> {
        self.base.get("events/today".into(), StatusCode::OK).await
    }

    pub async fn create(&self, input: CreateEventInput) -> APIResponse<create_event::APIResponse> {
        let body = create_event::RequestBody {
            summary: input.summary,
            start_time: input.start_time,
            end_time: input.end_time,
            description: input.description,
            timezone: input.timezone,
        };
        self.base
            .post(body, "events".into(), StatusCode::CREATED)
            .await
    }

    pub async fn update(&self, input: UpdateEventInput) -> APIResponse<update_event::APIResponse> {
        let body = update_event::RequestBody {
            summary: input.summary,
            start_time: input.start_time,
            end_time: input.end_time,
            description: input.description,
        };
        self.base
            .patch(body, format!("events/{}", input.event_id), StatusCode::OK)
            .await
    }

    pub async fn delete(&self, event_id: String) -> APIResponse<delete_event::APIResponse> {
        self.base
            .delete(format!("events/{}", event_id), StatusCode::OK)
            .await
    }
}
