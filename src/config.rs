//! Service configuration, read from the environment (and `.env`).

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::media::CloudinaryConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub nats_url: Option<String>,
    pub cloudinary: CloudinaryConfig,
    pub upload_folder: String,
    pub max_image_kb: u64,
    pub products_per_page: i64,
}

/// Loads `.env` if present, then reads the process environment.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

/// Parsing and validation over an arbitrary lookup, so tests can pass a map.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    fn parse<T: FromStr>(var: &str, raw: String) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    }

    let products_per_page: i64 = parse("PRODUCT_PER_PAGE", or_default("PRODUCT_PER_PAGE", "8"))?;
    if products_per_page < 1 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PRODUCT_PER_PAGE".into(),
            reason: "must be at least 1".into(),
        });
    }

    Ok(AppConfig {
        database_url: require("DATABASE_URL")?,
        bind_addr: parse("CATALOG_BIND_ADDR", or_default("CATALOG_BIND_ADDR", "0.0.0.0:8083"))?,
        log_level: or_default("CATALOG_LOG_LEVEL", "info"),
        db_max_connections: parse("CATALOG_DB_MAX_CONNECTIONS", or_default("CATALOG_DB_MAX_CONNECTIONS", "10"))?,
        nats_url: lookup("NATS_URL").ok().filter(|v| !v.trim().is_empty()),
        cloudinary: CloudinaryConfig {
            cloud_name: require("CLOUDINARY_CLOUD_NAME")?,
            api_key: require("CLOUDINARY_API_KEY")?,
            api_secret: require("CLOUDINARY_API_SECRET")?,
            timeout_secs: parse("CLOUDINARY_TIMEOUT_SECS", or_default("CLOUDINARY_TIMEOUT_SECS", "30"))?,
        },
        upload_folder: or_default("CATALOG_UPLOAD_FOLDER", "products"),
        max_image_kb: parse("CATALOG_MAX_IMAGE_KB", or_default("CATALOG_MAX_IMAGE_KB", "500"))?,
        products_per_page,
    })
}
