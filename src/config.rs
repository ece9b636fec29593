//! Process configuration, loaded once at startup from the environment.

use std::time::Duration;

use serde::Deserialize;

/// Application configuration. Constructed once in `main` and threaded
/// through [`crate::context::AppContext`] — no global statics.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub secret_key: String,
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default)]
    pub next_frontend_url: Option<String>,
    #[serde(default = "default_lock_ttl_seconds")]
    pub connector_indexing_lock_ttl_seconds: u64,
    #[serde(default = "default_refresh_token_lifetime_seconds")]
    pub refresh_token_lifetime_seconds: u64,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_heartbeat_ttl_seconds")]
    pub agent_heartbeat_ttl_seconds: u64,
    pub openai_api_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub notion_mcp_server_url: Option<String>,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_lock_ttl_seconds() -> u64 {
    30 * 60
}

fn default_refresh_token_lifetime_seconds() -> u64 {
    30 * 24 * 60 * 60
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_heartbeat_ttl_seconds() -> u64 {
    120
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_requests_per_minute() -> u32 {
    60
}

impl AppConfig {
    /// Load configuration from `.env` (if present) and the process
    /// environment. Missing required variables are a config error (exit
    /// code 1 per the CLI contract).
    pub fn load() -> Result<Self, crate::error::AppError> {
        // Populate process env from .env without overriding variables
        // that are already set (matches ironclaw's dotenvy usage).
        let _ = dotenvy::dotenv();

        let source = config::Environment::default()
            .try_parsing(true)
            .separator("__");

        config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))
    }

    pub fn connector_indexing_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.connector_indexing_lock_ttl_seconds)
    }

    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.refresh_token_lifetime_seconds)
    }

    pub fn agent_heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.agent_heartbeat_ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        assert_eq!(default_embedding_model(), "text-embedding-3-small");
        assert_eq!(default_lock_ttl_seconds(), 1800);
    }
}
