mod twilio_webhook;
mod twiml;

use actix_web::web;
use twilio_webhook::twilio_webhook_controller;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/twilio/webhook", web::post().to(twilio_webhook_controller));
}
