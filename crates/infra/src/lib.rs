mod config;
mod repos;
mod services;
mod system;

pub use config::{Config, ConfigError, GoogleConfig, ReminderConfig, TwilioConfig};
pub use repos::*;
pub use services::*;
use std::sync::Arc;
pub use system::{ISys, RealSys, StaticTimeSys};

/// The external collaborators the application talks to
#[derive(Clone)]
pub struct Services {
    pub calendar: Arc<dyn ICalendarProvider>,
    pub messages: Arc<dyn IMessageSender>,
    pub google_oauth: Arc<dyn IGoogleOAuth>,
}

#[derive(Clone)]
pub struct NudgemeContext {
    pub repos: Repos,
    pub services: Services,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
}

impl NudgemeContext {
    async fn create(config: Config) -> anyhow::Result<Self> {
        let repos = Repos::create_json_files(&config).await?;
        let sys: Arc<dyn ISys> = Arc::new(RealSys {});
        let services = Services {
            calendar: Arc::new(GoogleCalendarProvider::new(
                config.google.clone(),
                config.timezone,
                repos.google_tokens.clone(),
                sys.clone(),
            )),
            messages: Arc::new(TwilioMessageSender::new(config.twilio.clone())),
            google_oauth: Arc::new(GoogleOAuthClient::new(config.google.clone())),
        };
        Ok(Self {
            repos,
            services,
            config,
            sys,
        })
    }

    /// Context backed entirely by in-memory fakes, used by tests
    pub fn create_inmemory() -> Self {
        Self {
            repos: Repos::create_inmemory(),
            services: Services {
                calendar: Arc::new(InMemoryCalendarProvider::new()),
                messages: Arc::new(InMemoryMessageSender::new()),
                google_oauth: Arc::new(InMemoryGoogleOAuth::new("valid-code")),
            },
            config: Config::default(),
            sys: Arc::new(RealSys {}),
        }
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> anyhow::Result<NudgemeContext> {
    let config = Config::new()?;
    NudgemeContext::create(config).await
}
