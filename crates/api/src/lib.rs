mod error;
mod event;
mod job_schedulers;
mod oauth;
mod reminders;
mod shared;
mod sms;
mod status;

use actix_cors::Cors;
use actix_web::{dev::Server, middleware, web, App, HttpServer};
use job_schedulers::start_send_reminders_job;
use nudgeme_infra::NudgemeContext;
use oauth::OAuthStateCache;
use std::net::TcpListener;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_actix_web::TracingLogger;

pub use reminders::{
    CycleError, CycleOutcome, CycleReport, DispatcherStatus, HaltReason, ReminderDispatcher,
};

pub fn configure_server_api(cfg: &mut web::ServiceConfig) {
    event::configure_routes(cfg);
    oauth::configure_routes(cfg);
    reminders::configure_routes(cfg);
    sms::configure_routes(cfg);
    status::configure_routes(cfg);
}

pub struct Application {
    server: Server,
    port: u16,
    dispatcher: Arc<ReminderDispatcher>,
    shutdown: CancellationToken,
}

impl Application {
    pub async fn new(context: NudgemeContext) -> Result<Self, std::io::Error> {
        let dispatcher = Arc::new(ReminderDispatcher::new(context.clone()));
        let (server, port) =
            Application::configure_server(context, dispatcher.clone()).await?;
        let shutdown = CancellationToken::new();
        Application::start_job_schedulers(dispatcher.clone(), shutdown.clone());

        Ok(Self {
            server,
            port,
            dispatcher,
            shutdown,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The dispatcher driven by the reminder job, e.g. to run a cycle on demand
    pub fn dispatcher(&self) -> Arc<ReminderDispatcher> {
        self.dispatcher.clone()
    }

    fn start_job_schedulers(dispatcher: Arc<ReminderDispatcher>, shutdown: CancellationToken) {
        start_send_reminders_job(dispatcher, shutdown);
    }

    async fn configure_server(
        context: NudgemeContext,
        dispatcher: Arc<ReminderDispatcher>,
    ) -> Result<(Server, u16), std::io::Error> {
        let port = context.config.port;
        let address = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();

        let ctx = web::Data::new(context);
        let dispatcher = web::Data::new(dispatcher);
        let oauth_states = web::Data::new(OAuthStateCache::default());

        let server = HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .wrap(middleware::Compress::default())
                .wrap(TracingLogger::default())
                .app_data(ctx.clone())
                .app_data(dispatcher.clone())
                .app_data(oauth_states.clone())
                .service(web::scope("/api/v1").configure(configure_server_api))
        })
        .listen(listener)?
        .workers(4)
        .run();

        Ok((server, port))
    }

    /// Serves until the server stops, then stops the reminder job
    pub async fn start(self) -> Result<(), std::io::Error> {
        let res = self.server.await;
        info!("Server stopped, stopping the reminder job");
        self.shutdown.cancel();
        res
    }
}
