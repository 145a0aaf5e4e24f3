pub mod create_event;
mod delete_event;
pub mod get_events_today;
mod update_event;

use actix_web::web;
use create_event::create_event_controller;
use delete_event::delete_event_controller;
use get_events_today::get_events_today_controller;
use update_event::update_event_controller;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/events", web::post().to(create_event_controller));
    cfg.route("/events/today", web::get().to(get_events_today_controller));

    cfg.route(
        "/events/{event_id}",
        web::patch().to(update_event_controller),
    );
    cfg.route(
        "/events/{event_id}",
        web::delete().to(delete_event_controller),
    );
}
