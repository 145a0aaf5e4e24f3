use nudgeme_api::Application;
use nudgeme_infra::{Config, InMemoryCalendarProvider, InMemoryMessageSender, NudgemeContext};
use nudgeme_sdk::NudgemeSDK;
use std::sync::Arc;

pub struct TestApp {
    pub config: Config,
    pub calendar: Arc<InMemoryCalendarProvider>,
    pub sender: Arc<InMemoryMessageSender>,
    pub dispatcher: Arc<nudgeme_api::ReminderDispatcher>,
}

// Launch the application as a background task
pub async fn spawn_app() -> (TestApp, NudgemeSDK, String) {
    let mut ctx = NudgemeContext::create_inmemory();
    ctx.config.port = 0; // Random port
    let calendar = Arc::new(InMemoryCalendarProvider::new());
    let sender = Arc::new(InMemoryMessageSender::new());
    ctx.services.calendar = calendar.clone();
    ctx.services.messages = sender.clone();

    let config = ctx.config.clone();
    let application = Application::new(ctx)
        .await
        .expect("Failed to build application.");

    let address = format!("http://localhost:{}/api/v1", application.port());
    let dispatcher = application.dispatcher();
    let _ = actix_web::rt::spawn(async move {
        application
            .start()
            .await
            .expect("Expected application to start");
    });

    let app = TestApp {
        config,
        calendar,
        sender,
        dispatcher,
    };
    let sdk = NudgemeSDK::new(address.clone());
    (app, sdk, address)
}
