mod dispatcher;
mod get_reminders_status;
mod scanner;

use actix_web::web;
use get_reminders_status::get_reminders_status_controller;

pub use dispatcher::{
    CycleError, CycleOutcome, CycleReport, DispatcherStatus, HaltReason, ReminderDispatcher,
};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/reminders/status",
        web::get().to(get_reminders_status_controller),
    );
}
