//! # ls-configs
//!
//! Layered configuration: built-in defaults, then an optional
//! `config/litscope.toml`, then `LITSCOPE_*` environment variables
//! (double-underscore separated, e.g. `LITSCOPE_SERVER__BIND_ADDR`).
//! Secrets stay wrapped in `SecretString` so they never land in logs.

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Filesystem root for stored uploads.
    pub root_dir: String,
    /// URL prefix the stored objects are served under.
    pub url_prefix: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.bind_addr", "127.0.0.1:8080")?
            .set_default("catalog.base_url", "https://www.googleapis.com/books/v1")?
            .set_default("catalog.api_key", "")?
            .set_default("media.root_dir", "./data/uploads")?
            .set_default("media.url_prefix", "/static/uploads")?
            .add_source(File::with_name("config/litscope").required(false))
            .add_source(Environment::with_prefix("LITSCOPE").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
