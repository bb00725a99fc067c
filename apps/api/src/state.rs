use std::sync::Arc;

use sqlx::PgPool;

use crate::ai_client::OpenRouterClient;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub ai: Arc<OpenRouterClient>,
    pub config: Config,
}
