use serde::Deserialize;
use std::path::{Path, PathBuf};
use validator::Validate;

/// Main configuration for the WhatsApp Manager host and view-model
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    /// HTTP server port
    #[validate(range(min = 1024, max = 65535))]
    pub server_port: u16,

    /// `production` serves the built dashboard; anything else answers with a
    /// JSON placeholder
    pub environment: String,

    /// Directory holding the built single-page application
    pub static_dir: String,

    /// Base URL of the hosted gateway (REST + auth)
    #[validate(url)]
    pub gateway_url: String,

    /// Public (anon) key sent with every gateway request
    pub gateway_anon_key: String,

    /// Client registry page size
    #[validate(range(min = 1, max = 1000))]
    pub clients_page_size: u64,

    /// Seconds between conversation refreshes
    #[validate(range(min = 1, max = 3600))]
    pub refresh_interval_secs: u64,

    /// Log level (e.g., info, debug, trace)
    pub log_level: String,

    /// Whether to answer CORS preflights permissively
    pub cors_enabled: bool,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(Some(&default_config_path()))
    }

    /// Layers defaults, an optional config file, then `WAMANAGER__*`
    /// environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server_port", 5000)?
            .set_default("environment", "development")?
            .set_default("static_dir", "client/build")?
            .set_default("gateway_url", "http://localhost:54321")?
            .set_default("gateway_anon_key", "")?
            .set_default("clients_page_size", 10)?
            .set_default("refresh_interval_secs", 30)?
            .set_default("log_level", "info")?
            .set_default("cors_enabled", true)?;

        if let Some(path) = path {
            builder = builder
                .add_source(config::File::with_name(&path.to_string_lossy()).required(false));
        }

        let settings = builder
            // Environment overrides: WAMANAGER__SERVER_PORT, WAMANAGER__GATEWAY_URL, etc.
            .add_source(config::Environment::with_prefix("WAMANAGER").separator("__"))
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Default tracing filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> String {
        format!("whatsapp_manager={},tower_http={}", self.log_level, self.log_level)
    }
}

/// `~/.whatsapp-manager/config` (any extension the `config` crate knows).
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".whatsapp-manager")
        .join("config")
}
