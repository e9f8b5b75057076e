pub mod freshness;
pub mod pagination;
pub mod search;
pub mod view_model;

use std::time::Duration;

use crate::config::Config;
use crate::storage::gateway::GatewayError;

pub use view_model::{SyncViewModel, ViewSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("No authenticated user")]
    NotAuthenticated,
    #[error("No more clients to load")]
    NothingToLoad,
    #[error("A client page is already loading")]
    LoadInFlight,
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Tunables of the view-model.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub page_size: u64,
    pub refresh_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: pagination::DEFAULT_PAGE_SIZE,
            refresh_interval: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for SyncSettings {
    fn from(cfg: &Config) -> Self {
        SyncSettings {
            page_size: cfg.clients_page_size,
            refresh_interval: Duration::from_secs(cfg.refresh_interval_secs),
        }
    }
}
