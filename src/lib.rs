//! WhatsApp Manager - conversation and client registry dashboard

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;
pub mod sync;

// Re-export main types for convenience
pub use crate::api::routes::{create_router, AppState};
pub use crate::auth::{AuthError, AuthService};
pub use crate::config::Config;
pub use crate::models::internal::{
    Client, Conversation, ConversationSummary, Message, NewClient, SenderType,
};
pub use crate::storage::gateway::{DataGateway, GatewayError, IdentityProvider};
pub use crate::storage::rest_gateway::RestGateway;
pub use crate::sync::{SyncError, SyncSettings, SyncViewModel, ViewSnapshot};
