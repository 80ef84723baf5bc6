//! Configuration loading from environment.

use std::env;

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,

    // External payment provider
    pub provider_base_url: String,
    pub provider_client_id: String,
    pub provider_client_secret: String,
    pub provider_redirect_uri: String,
    pub provider_platform_token: String,
    pub notification_url: String,
    /// Optional shared secret for webhook signature verification.
    pub webhook_secret: Option<String>,

    // Peer user directory
    pub user_directory_url: String,

    /// 64-hex-character credential encryption key (32 bytes).
    pub credential_key: String,

    // Timings
    pub session_window_minutes: i64,
    pub refresh_lead_days: i64,
    pub refresh_interval_hours: u64,
    pub reaper_entity_ttl_hours: i64,
    pub reaper_state_ttl_minutes: i64,
    pub reaper_interval_minutes: u64,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("{} environment variable is required", key))
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(raw.parse()?),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let credential_key = required("CREDENTIAL_KEY")?;
        if credential_key.len() != 64 {
            anyhow::bail!("CREDENTIAL_KEY must be 64 hex characters (32 bytes)");
        }

        Ok(Self {
            port: parsed_or("PORT", 3000)?,
            database_url: required("DATABASE_URL")?,

            provider_base_url: required("PROVIDER_BASE_URL")?,
            provider_client_id: required("PROVIDER_CLIENT_ID")?,
            provider_client_secret: required("PROVIDER_CLIENT_SECRET")?,
            provider_redirect_uri: required("PROVIDER_REDIRECT_URI")?,
            provider_platform_token: required("PROVIDER_PLATFORM_TOKEN")?,
            notification_url: required("NOTIFICATION_URL")?,
            webhook_secret: env::var("WEBHOOK_SECRET").ok(),

            user_directory_url: required("USER_DIRECTORY_URL")?,

            credential_key,

            session_window_minutes: parsed_or("SESSION_WINDOW_MINUTES", 15)?,
            refresh_lead_days: parsed_or("REFRESH_LEAD_DAYS", 7)?,
            refresh_interval_hours: parsed_or("REFRESH_INTERVAL_HOURS", 24)?,
            reaper_entity_ttl_hours: parsed_or("REAPER_ENTITY_TTL_HOURS", 24)?,
            reaper_state_ttl_minutes: parsed_or("REAPER_STATE_TTL_MINUTES", 60)?,
            reaper_interval_minutes: parsed_or("REAPER_INTERVAL_MINUTES", 30)?,
        })
    }
}
