use chrono::Duration;
use nudgeme_domain::{ReminderOffset, Tz};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_PERSONALITY_PROMPT: &str =
    "You are Nudgeme, an upbeat scheduling sidekick who keeps texts short and sprinkles in emoji.";

/// Upper bound for the lookahead and retention windows
const MAX_WINDOW_DAYS: i64 = 366;

fn max_window() -> Duration {
    Duration::days(MAX_WINDOW_DAYS)
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("The {0} environment variable is required")]
    MissingVariable(&'static str),
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub calendar_id: String,
    pub token_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    /// Recipient of every reminder and the only expected SMS sender
    pub user_phone_number: String,
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub state_path: PathBuf,
    pub lookahead: Duration,
    /// Ordered largest lead time first, never longer than `lookahead`
    pub offsets: Vec<ReminderOffset>,
    pub scan_interval: std::time::Duration,
    pub send_timeout: std::time::Duration,
    pub send_concurrency: usize,
    pub flush_attempts: usize,
    /// Ledger records dispatched longer ago than this are pruned. Never shorter than `lookahead`.
    pub ledger_retention: Duration,
}

impl ReminderConfig {
    /// Upper bound for the sending phase of a single cycle
    pub fn cycle_deadline(&self) -> std::time::Duration {
        let margin = std::time::Duration::from_secs(5);
        let min = std::time::Duration::from_secs(1);
        self.scan_interval.saturating_sub(margin).max(min)
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("data/reminder_state.json"),
            lookahead: Duration::hours(24),
            offsets: vec![
                ReminderOffset::new(Duration::hours(2)),
                ReminderOffset::new(Duration::minutes(10)),
            ],
            scan_interval: std::time::Duration::from_secs(60),
            send_timeout: std::time::Duration::from_secs(5),
            send_concurrency: 4,
            flush_attempts: 3,
            ledger_retention: Duration::hours(48),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the application to run on
    pub port: usize,
    pub app_env: String,
    /// Timezone used for "today" and for rendering times in SMS replies
    pub timezone: Tz,
    /// Only decides the `MessageStyle` of outbound texts
    pub personality_prompt: String,
    pub google: GoogleConfig,
    pub twilio: TwilioConfig,
    pub reminders: ReminderConfig,
}

impl Config {
    /// Reads the configuration from the process environment
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let port = env.parse_or("PORT", 8000);
        let app_env = env.get("APP_ENV").unwrap_or_else(|| "development".into());
        let timezone = env.parse_or("TZ", chrono_tz::UTC);
        let personality_prompt = env
            .get("PERSONALITY_PROMPT")
            .unwrap_or_else(|| DEFAULT_PERSONALITY_PROMPT.into());

        let google = GoogleConfig {
            client_id: env.required("GOOGLE_CLIENT_ID")?,
            client_secret: env.required("GOOGLE_CLIENT_SECRET")?,
            redirect_uri: env.get("GOOGLE_REDIRECT_URI").unwrap_or_else(|| {
                format!("http://localhost:{}/api/v1/oauth/google/callback", port)
            }),
            calendar_id: env
                .get("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|| "primary".into()),
            token_path: env
                .get("GOOGLE_TOKEN_PATH")
                .unwrap_or_else(|| "data/google_token.json".into())
                .into(),
        };

        let twilio = TwilioConfig {
            account_sid: env.required("TWILIO_ACCOUNT_SID")?,
            auth_token: env.required("TWILIO_AUTH_TOKEN")?,
            from_number: env.required("TWILIO_FROM_NUMBER")?,
            user_phone_number: env.required("USER_PHONE_NUMBER")?,
        };

        let reminders = env.reminder_config();
        info!(
            lookahead = %nudgeme_domain::date::format_compact_duration(reminders.lookahead),
            offsets = ?reminders.offsets.iter().map(|o| o.id()).collect::<Vec<_>>(),
            scan_interval_secs = reminders.scan_interval.as_secs(),
            "Reminder engine configured"
        );

        Ok(Self {
            port,
            app_env,
            timezone,
            personality_prompt,
            google,
            twilio,
            reminders,
        })
    }
}

/// Configuration used by tests and the in-memory context
impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            app_env: "test".into(),
            timezone: chrono_tz::UTC,
            personality_prompt: DEFAULT_PERSONALITY_PROMPT.into(),
            google: GoogleConfig {
                client_id: "google-client-id".into(),
                client_secret: "google-client-secret".into(),
                redirect_uri: "http://localhost:8000/api/v1/oauth/google/callback".into(),
                calendar_id: "primary".into(),
                token_path: PathBuf::from("data/google_token.json"),
            },
            twilio: TwilioConfig {
                account_sid: "AC00000000000000000000000000000000".into(),
                auth_token: "twilio-auth-token".into(),
                from_number: "+15550000000".into(),
                user_phone_number: "+15551234567".into(),
            },
            reminders: ReminderConfig::default(),
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::MissingVariable(key))
    }

    fn parse_or<T: FromStr + std::fmt::Debug>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(val) => match val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    warn!(
                        "The given {}: {} is not valid, falling back to the default: {:?}.",
                        key, val, default
                    );
                    default
                }
            },
            None => default,
        }
    }

    fn duration_or(&self, key: &str, default: Duration) -> Duration {
        match self.get(key) {
            Some(val) => match nudgeme_domain::date::parse_compact_duration(&val) {
                Ok(parsed) if parsed > max_window() => {
                    warn!(
                        "{} of {} is longer than {} days, falling back to the default.",
                        key, val, MAX_WINDOW_DAYS
                    );
                    default
                }
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("{} for {}, falling back to the default.", e, key);
                    default
                }
            },
            None => default,
        }
    }

    fn reminder_config(&self) -> ReminderConfig {
        let defaults = ReminderConfig::default();

        let lookahead = self.duration_or("REMINDER_LOOKAHEAD", defaults.lookahead);

        let offsets = match self.get("REMINDER_OFFSETS") {
            Some(val) => match ReminderOffset::parse_list(&val) {
                Ok(offsets) if !offsets.is_empty() => offsets,
                Ok(_) => {
                    warn!("REMINDER_OFFSETS is empty, falling back to the default offsets.");
                    defaults.offsets.clone()
                }
                Err(e) => {
                    warn!("{} in REMINDER_OFFSETS, falling back to the default offsets.", e);
                    defaults.offsets.clone()
                }
            },
            None => defaults.offsets.clone(),
        };
        let offsets = offsets
            .into_iter()
            .filter(|offset| {
                let fits = offset.before() <= lookahead;
                if !fits {
                    warn!(
                        "Reminder offset {} is longer than the lookahead window and will never fire. Dropping it.",
                        offset
                    );
                }
                fits
            })
            .collect();

        let scan_interval_secs = self
            .parse_or(
                "REMINDER_SCAN_INTERVAL_SECONDS",
                defaults.scan_interval.as_secs(),
            )
            .max(1);
        let send_timeout_secs = self
            .parse_or(
                "REMINDER_SEND_TIMEOUT_SECONDS",
                defaults.send_timeout.as_secs(),
            )
            .max(1);
        let send_concurrency = self
            .parse_or("REMINDER_SEND_CONCURRENCY", defaults.send_concurrency)
            .max(1);

        let mut ledger_retention =
            self.duration_or("REMINDER_LEDGER_RETENTION", defaults.ledger_retention);
        if ledger_retention < lookahead {
            warn!("REMINDER_LEDGER_RETENTION is shorter than the lookahead window, using the lookahead instead.");
            ledger_retention = lookahead;
        }

        ReminderConfig {
            state_path: self
                .get("REMINDER_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            lookahead,
            offsets,
            scan_interval: std::time::Duration::from_secs(scan_interval_secs),
            send_timeout: std::time::Duration::from_secs(send_timeout_secs),
            send_concurrency,
            flush_attempts: defaults.flush_attempts,
            ledger_retention,
        }
    }
}
