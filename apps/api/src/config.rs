use anyhow::{Context, Result};
use uuid::Uuid;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing, in particular the
/// OpenRouter API key, without which the generation subsystem cannot run.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openrouter_api_key: String,
    /// Owner id stamped on every row until session auth lands.
    pub default_user_id: Uuid,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            openrouter_api_key: require_env("OPENROUTER_API_KEY")?,
            default_user_id: std::env::var("DEFAULT_USER_ID")
                .unwrap_or_else(|_| "00000000-0000-0000-0000-000000000001".to_string())
                .parse::<Uuid>()
                .context("DEFAULT_USER_ID must be a valid UUID")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
