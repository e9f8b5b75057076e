use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::models::internal::{AuthEvent, Session, UserIdentity};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Gateway API error {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Decode error: {0}")]
    DecodeError(#[from] serde_json::Error),
    #[error("No authenticated session")]
    NotAuthenticated,
}

pub const CONVERSATIONS: &str = "conversations";
pub const MESSAGES: &str = "messages";
pub const CLIENTS: &str = "clientes";

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact match.
    Eq { column: String, value: String },
    /// Case-insensitive substring match.
    ILike { column: String, needle: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Inclusive row range, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub from: u64,
    pub to: u64,
}

impl RowRange {
    pub fn len(&self) -> u64 {
        self.to + 1 - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }
}

/// Point-in-time read against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub table: String,
    pub select: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub range: Option<RowRange>,
    pub limit: Option<u64>,
    pub count_exact: bool,
}

impl TableQuery {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: None,
            range: None,
            limit: None,
            count_exact: false,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn ilike(mut self, column: &str, needle: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike {
            column: column.to_string(),
            needle: needle.into(),
        });
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some(RowRange { from, to });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn count_exact(mut self) -> Self {
        self.count_exact = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    /// Present only when the query asked for an exact count.
    pub total: Option<u64>,
}

impl QueryResult {
    pub fn decode<T: DeserializeOwned>(self) -> Result<Vec<T>, GatewayError> {
        self.rows
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(GatewayError::from))
            .collect()
    }
}

/// Table access of the hosted store.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn query(&self, query: TableQuery) -> Result<QueryResult, GatewayError>;
    async fn insert(&self, table: &str, record: Value) -> Result<Value, GatewayError>;
    async fn current_user(&self) -> Result<Option<UserIdentity>, GatewayError>;
}

/// Session side of the hosted store.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, GatewayError>;
    async fn sign_up(&self, email: &str, password: &str)
        -> Result<Option<UserIdentity>, GatewayError>;
    async fn sign_out(&self) -> Result<(), GatewayError>;
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
