use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Database configuration
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Push notification configuration
    pub push_enabled: bool,
    pub push_ttl: u32,
    pub notification_sender: String,

    // Background tasks
    pub pending_digest_interval: u64,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "5500".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "lifelink".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "donation".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            push_enabled: env::var("PUSH_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            push_ttl: env::var("PUSH_TTL")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            notification_sender: env::var("NOTIFICATION_SENDER")
                .unwrap_or_else(|_| "LifeLink".to_string()),

            pending_digest_interval: env::var("PENDING_DIGEST_INTERVAL")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5500".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    /// Local defaults backed by the embedded in-memory database.
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 5500,
            environment: "development".to_string(),
            log_level: "debug".to_string(),
            database_url: "mem://".to_string(),
            database_namespace: "lifelink".to_string(),
            database_name: "donation".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),
            push_enabled: true,
            push_ttl: 60,
            notification_sender: "LifeLink".to_string(),
            pending_digest_interval: 3600,
            cors_allowed_origins: "http://localhost:5500".to_string(),
        }
    }
}
