use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AppError, Result};

/// Which store serves `PUT /api/products/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateBackend {
    /// Coerces numbers and dates and updates the relational mirror.
    Relational,
    /// Writes the fields to the product document as sent.
    Document,
}

impl FromStr for UpdateBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "relational" | "postgres" => Ok(UpdateBackend::Relational),
            "document" | "mongodb" => Ok(UpdateBackend::Document),
            other => Err(AppError::Config(format!(
                "PRODUCT_UPDATE_BACKEND must be 'relational' or 'document', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub database_name: String,
    pub mirror_database_url: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub media_root: PathBuf,
    pub public_base_url: String,
    pub update_backend: UpdateBackend,
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", name, e)))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let server_host = optional("SERVER_HOST", "127.0.0.1");
        let server_port = optional("SERVER_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
        let token_ttl_minutes = optional("TOKEN_TTL_MINUTES", "60")
            .parse::<i64>()
            .map_err(|e| AppError::Config(format!("Invalid TOKEN_TTL_MINUTES: {}", e)))?;
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port));

        let config = AppConfig {
            database_url: required("DATABASE_URL")?,
            database_name: optional("DATABASE_NAME", "catalog"),
            mirror_database_url: required("MIRROR_DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            token_ttl_minutes,
            media_root: PathBuf::from(optional("MEDIA_ROOT", "./media")),
            public_base_url,
            update_backend: optional("PRODUCT_UPDATE_BACKEND", "relational").parse()?,
            server_host,
            server_port,
        };
        log::info!(
            "Configuration loaded; PUT /api/products/{{id}} served by {:?} store",
            config.update_backend
        );
        Ok(config)
    }
}
