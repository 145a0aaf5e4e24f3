mod google;
mod state_cache;

use actix_web::web;
use google::{google_oauth_callback_controller, start_google_oauth_controller};
pub use state_cache::OAuthStateCache;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/oauth/google/start",
        web::get().to(start_google_oauth_controller),
    );
    cfg.route(
        "/oauth/google/callback",
        web::get().to(google_oauth_callback_controller),
    );
}
